#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use winsync_core::db::open_db_in_memory;
use winsync_core::{
    FieldDescriptor, FieldType, GridDescriptor, PropertyName, PropertyValue, PropertyValueSet,
    RecordDescriptor, RecordModel, RecordRef, RecordRepository, RecordSnapshot, RepoError,
    RepoResult, RowId, SessionContext, SharedModel, SqliteRecordRepository, View, ViewListener,
};

pub const WINDOW: &str = "sales_order";

pub fn name(value: &str) -> PropertyName {
    PropertyName::new(value).unwrap()
}

pub fn row(value: &str) -> RowId {
    RowId::new(value).unwrap()
}

/// Order header with a computed amount, plus a `lines` grid whose net is
/// computed per row and summed into `total_lines`.
pub fn order_descriptor() -> Arc<RecordDescriptor> {
    let descriptor = RecordDescriptor::builder(WINDOW)
        .field(FieldDescriptor::new(name("customer"), FieldType::Text))
        .field(FieldDescriptor::new(name("qty"), FieldType::Number))
        .field(FieldDescriptor::new(name("price"), FieldType::Number))
        .field(
            FieldDescriptor::new(name("amount"), FieldType::Number).computed(
                vec![name("qty"), name("price")],
                |record| {
                    PropertyValue::Number(record.number(&name("qty")) * record.number(&name("price")))
                },
            ),
        )
        .field(
            FieldDescriptor::new(name("status"), FieldType::List).allowed_values(["DR", "CO"]),
        )
        .field(
            FieldDescriptor::new(name("total_lines"), FieldType::Number).computed(
                vec![name("lines")],
                |record| PropertyValue::Number(record.sum_column(&name("lines"), &name("line_net"))),
            ),
        )
        .grid(
            GridDescriptor::new(name("lines"))
                .column(FieldDescriptor::new(name("product"), FieldType::Text))
                .column(FieldDescriptor::new(name("line_qty"), FieldType::Number))
                .column(FieldDescriptor::new(name("unit_price"), FieldType::Number))
                .column(
                    FieldDescriptor::new(name("line_net"), FieldType::Number).computed_in_row(
                        vec![name("line_qty"), name("unit_price")],
                        |cells| {
                            let number = |cell: &str| {
                                cells
                                    .get(&name(cell))
                                    .and_then(PropertyValue::as_number)
                                    .unwrap_or(0.0)
                            };
                            PropertyValue::Number(number("line_qty") * number("unit_price"))
                        },
                    ),
                ),
        )
        .build()
        .unwrap();
    Arc::new(descriptor)
}

pub fn record_with_qty(qty: f64) -> RecordSnapshot {
    let mut snapshot = RecordSnapshot::default();
    snapshot
        .properties
        .insert(name("qty"), PropertyValue::Number(qty));
    snapshot
        .properties
        .insert(name("price"), PropertyValue::Number(1.0));
    snapshot
        .properties
        .insert(name("amount"), PropertyValue::Number(qty));
    snapshot
}

/// In-memory repository holding `r1..=rN`, record `rI` with `qty = I`.
pub fn seeded_repository(count: usize) -> SqliteRecordRepository {
    let repo = SqliteRecordRepository::new(open_db_in_memory().unwrap());
    let session = SessionContext::system();
    for index in 1..=count {
        repo.save(
            WINDOW,
            &RecordRef::new(format!("r{index}")),
            &record_with_qty(index as f64),
            &session,
        )
        .unwrap();
    }
    repo
}

pub fn open_model(repository: impl RecordRepository + 'static) -> RecordModel {
    RecordModel::open(
        order_descriptor(),
        Box::new(repository),
        SessionContext::new(11, 12, "tester"),
    )
    .unwrap()
}

pub fn shared_model(records: usize) -> SharedModel {
    open_model(seeded_repository(records)).into_shared()
}

/// Repository whose saves can be switched to fail.
pub struct FailingRepository {
    inner: SqliteRecordRepository,
    fail_saves: Arc<AtomicBool>,
}

impl FailingRepository {
    pub fn new(inner: SqliteRecordRepository) -> (Self, Arc<AtomicBool>) {
        let fail_saves = Arc::new(AtomicBool::new(true));
        (
            Self {
                inner,
                fail_saves: Arc::clone(&fail_saves),
            },
            fail_saves,
        )
    }
}

impl RecordRepository for FailingRepository {
    fn list_refs(&self, window_id: &str) -> RepoResult<Vec<RecordRef>> {
        self.inner.list_refs(window_id)
    }

    fn load(&self, window_id: &str, record: &RecordRef) -> RepoResult<Option<RecordSnapshot>> {
        self.inner.load(window_id, record)
    }

    fn save(
        &self,
        window_id: &str,
        record: &RecordRef,
        snapshot: &RecordSnapshot,
        session: &SessionContext,
    ) -> RepoResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("disk full".to_string()));
        }
        self.inner.save(window_id, record, snapshot, session)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    SetProperties(PropertyValueSet),
    SetProperty(PropertyName, PropertyValue),
    SetGridProperty(PropertyName, RowId, PropertyName, PropertyValue),
    GridNewRow(PropertyName, RowId, PropertyValueSet),
    PreviousEnabled(bool),
    NextEnabled(bool),
    ShowError(String),
    ConfirmDiscardChanges,
    CommitChanges,
}

/// View double that records every call and the thread it ran on.
#[derive(Default)]
pub struct RecordingView {
    calls: Mutex<Vec<(ViewCall, Option<String>)>>,
    listener: Mutex<Option<Arc<dyn ViewListener>>>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn threads(&self) -> Vec<Option<String>> {
        self.calls.lock().iter().map(|(_, thread)| thread.clone()).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn listener(&self) -> Option<Arc<dyn ViewListener>> {
        self.listener.lock().clone()
    }

    /// Simulates the user typing into a field.
    pub fn edit(&self, field: &str, value: impl Into<PropertyValue>) {
        let listener = self.listener().expect("view is not bound");
        listener.view_property_changed(&name(field), value.into());
    }

    pub fn pushed_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ViewCall::SetProperty(name, _) => Some(name.to_string()),
                ViewCall::SetGridProperty(grid, row, cell, _) => {
                    Some(format!("{grid}.{row}.{cell}"))
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ViewCall) {
        let thread = std::thread::current().name().map(str::to_string);
        self.calls.lock().push((call, thread));
    }
}

impl View for RecordingView {
    fn set_properties(&self, values: &PropertyValueSet) {
        self.record(ViewCall::SetProperties(values.clone()));
    }

    fn set_property(&self, name: &PropertyName, value: &PropertyValue) {
        self.record(ViewCall::SetProperty(name.clone(), value.clone()));
    }

    fn set_grid_property(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: &PropertyValue,
    ) {
        self.record(ViewCall::SetGridProperty(
            grid.clone(),
            row.clone(),
            cell.clone(),
            value.clone(),
        ));
    }

    fn grid_new_row(&self, grid: &PropertyName, row: &RowId, values: &PropertyValueSet) {
        self.record(ViewCall::GridNewRow(grid.clone(), row.clone(), values.clone()));
    }

    fn set_previous_record_enabled(&self, enabled: bool) {
        self.record(ViewCall::PreviousEnabled(enabled));
    }

    fn set_next_record_enabled(&self, enabled: bool) {
        self.record(ViewCall::NextEnabled(enabled));
    }

    fn show_error(&self, message: &str) {
        self.record(ViewCall::ShowError(message.to_string()));
    }

    fn confirm_discard_changes(&self) {
        self.record(ViewCall::ConfirmDiscardChanges);
    }

    fn commit_changes(&self) {
        self.record(ViewCall::CommitChanges);
    }

    fn set_listener(&self, listener: Option<Arc<dyn ViewListener>>) {
        *self.listener.lock() = listener;
    }
}
