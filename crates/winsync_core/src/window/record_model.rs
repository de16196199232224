//! Editable model of one window record.
//!
//! # Responsibility
//! - Hold the current values and grid rows of the record being edited.
//! - Recompute computed fields and publish change events on the model's bus.
//! - Own navigation and the save/cancel lifecycle.
//!
//! # Invariants
//! - Mutations are all-or-nothing: every change of one call, dependents
//!   included, is staged and validated before anything is committed.
//! - State is committed before any event of the call is published.
//! - Events of one call are published in order: the directly changed value
//!   first, then each changed dependent once, in declaration order.
//! - Setting a value equal to the current one is a no-op: no event, no dirty.
//! - `dirty` is true iff a mutation changed state since load/save/cancel.

use crate::event::bus::ChangeNotifier;
use crate::event::model_event::{
    AllPropertiesChangedEvent, ConfirmDiscardChangesEvent, GridPropertyChangedEvent,
    GridRowAddedEvent, ModelEvent, PropertyChangedEvent,
};
use crate::model::descriptor::{Computation, GridDescriptor, RecordDescriptor};
use crate::model::property_name::{PropertyIdentity, PropertyName, RowId};
use crate::model::snapshot::{row_value_set, RecordRef, RecordSnapshot, RowCells};
use crate::model::value::{PropertyValue, ValidationError};
use crate::model::value_set::PropertyValueSet;
use crate::repo::record_repo::{RecordRepository, RepoError};
use crate::session::SessionContext;
use crate::window::error::{ModelError, ModelResult};
use crate::window::navigation::{
    NavigationCursor, NavigationDirection, NavigationOutcome, OnChangesFound,
};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Model handle shared between a presenter and the window session.
pub type SharedModel = Arc<Mutex<RecordModel>>;

static NULL: PropertyValue = PropertyValue::Null;

pub struct RecordModel {
    descriptor: Arc<RecordDescriptor>,
    repository: Box<dyn RecordRepository>,
    session: SessionContext,
    bus: Arc<ChangeNotifier>,
    cursor: NavigationCursor,
    current: RecordRef,
    state: RecordSnapshot,
    saved: RecordSnapshot,
    dirty: bool,
}

impl RecordModel {
    /// Opens the window on its first stored record, or on a new empty record
    /// when nothing is stored yet.
    pub fn open(
        descriptor: Arc<RecordDescriptor>,
        repository: Box<dyn RecordRepository>,
        session: SessionContext,
    ) -> ModelResult<Self> {
        let window_id = descriptor.window_id().to_string();
        let refs = repository.list_refs(&window_id)?;

        let (current, state) = match refs.first() {
            Some(first) => {
                let stored = load_existing(repository.as_ref(), &window_id, first)?;
                (first.clone(), descriptor.conform(stored))
            }
            None => (RecordRef::generate(), descriptor.empty_snapshot()),
        };

        info!(
            "event=model_open module=window status=ok window={window_id} record={current} records={}",
            refs.len()
        );

        Ok(Self {
            cursor: NavigationCursor::new(refs, &current),
            current,
            saved: state.clone(),
            state,
            descriptor,
            repository,
            session,
            bus: Arc::new(ChangeNotifier::new()),
            dirty: false,
        })
    }

    pub fn into_shared(self) -> SharedModel {
        Arc::new(Mutex::new(self))
    }

    pub fn event_bus(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.bus)
    }

    pub fn descriptor(&self) -> &RecordDescriptor {
        &self.descriptor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn current_ref(&self) -> &RecordRef {
        &self.current
    }

    pub fn has_next_record(&self) -> bool {
        self.cursor.has_next()
    }

    pub fn has_previous_record(&self) -> bool {
        self.cursor.has_previous()
    }

    /// Current committed state.
    pub fn snapshot(&self) -> &RecordSnapshot {
        &self.state
    }

    /// Sets one scalar property.
    ///
    /// A composite `grid.row.cell` name is routed to `set_grid_property`.
    /// Returns `false` when the value was already current.
    ///
    /// # Errors
    /// - `UnknownProperty` for undeclared names.
    /// - `Validation` for grid names, computed fields and values the field
    ///   type rejects, including failures while recomputing dependents.
    pub fn set_property(&mut self, name: &PropertyName, value: PropertyValue) -> ModelResult<bool> {
        if let Some((grid, row, cell)) = self.descriptor.decompose(name) {
            return self.set_grid_property(&grid, &row, &cell, value);
        }
        if self.descriptor.grid(name).is_some() {
            return Err(ValidationError::ReadOnly {
                field: name.to_string(),
            }
            .into());
        }
        let field = self
            .descriptor
            .field(name)
            .ok_or_else(|| ModelError::UnknownProperty(name.to_string()))?;
        if field.is_computed() {
            return Err(ValidationError::ReadOnly {
                field: name.to_string(),
            }
            .into());
        }

        let value = field.coerce(name.as_str(), value)?;
        if self.state.value(name) == &value {
            trace!("event=set_property module=window status=unchanged name={name}");
            return Ok(false);
        }

        let mut staged = self.state.clone();
        staged.properties.insert(name.clone(), value.clone());
        let mut events = vec![ModelEvent::PropertyChanged(PropertyChangedEvent {
            name: name.clone(),
            value,
        })];
        let mut changed = vec![name.clone()];
        recompute_fields(&self.descriptor, &mut staged, &mut changed, &mut events)?;

        self.commit(staged, events);
        Ok(true)
    }

    /// Sets one grid cell. Returns `false` when the value was already current.
    ///
    /// # Errors
    /// - `UnknownProperty` for an undeclared grid/column or a missing row.
    /// - `Validation` for computed columns and rejected values.
    pub fn set_grid_property(
        &mut self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: PropertyValue,
    ) -> ModelResult<bool> {
        let identity = PropertyIdentity::grid_cell(grid, row, cell);
        let grid_descriptor = self
            .descriptor
            .grid(grid)
            .ok_or_else(|| ModelError::UnknownProperty(grid.to_string()))?;
        let column = grid_descriptor
            .find_column(cell)
            .ok_or_else(|| ModelError::UnknownProperty(identity.to_string()))?;
        if column.is_computed() {
            return Err(ValidationError::ReadOnly {
                field: identity.to_string(),
            }
            .into());
        }
        if !self
            .state
            .grid_rows(grid)
            .is_some_and(|rows| rows.contains_key(row))
        {
            return Err(ModelError::UnknownProperty(identity.to_string()));
        }

        let value = column.coerce(identity.to_string().as_str(), value)?;
        if self.state.grid_cell(grid, row, cell) == &value {
            trace!("event=set_grid_property module=window status=unchanged name={identity}");
            return Ok(false);
        }

        let mut staged = self.state.clone();
        let mut events = vec![ModelEvent::GridPropertyChanged(GridPropertyChangedEvent {
            grid: grid.clone(),
            row: row.clone(),
            cell: cell.clone(),
            value: value.clone(),
        })];
        if let Some(cells) = staged
            .grids
            .get_mut(grid)
            .and_then(|rows| rows.get_mut(row))
        {
            cells.insert(cell.clone(), value);
            let mut changed_cells = vec![cell.clone()];
            recompute_row(grid_descriptor, row, cells, &mut changed_cells, &mut events)?;
        }
        let mut changed = vec![grid.clone()];
        recompute_fields(&self.descriptor, &mut staged, &mut changed, &mut events)?;

        self.commit(staged, events);
        Ok(true)
    }

    /// Appends a row to `grid`.
    ///
    /// Columns missing from `initial_values` start null; computed columns are
    /// evaluated before the row is published.
    ///
    /// # Errors
    /// - `DuplicateRow` when `row` already exists.
    /// - `UnknownProperty` for an undeclared grid or column.
    /// - `Validation` for values on computed columns or rejected values.
    pub fn add_grid_row(
        &mut self,
        grid: &PropertyName,
        row: &RowId,
        initial_values: &PropertyValueSet,
    ) -> ModelResult<()> {
        let grid_descriptor = self
            .descriptor
            .grid(grid)
            .ok_or_else(|| ModelError::UnknownProperty(grid.to_string()))?;
        if self
            .state
            .grid_rows(grid)
            .is_some_and(|rows| rows.contains_key(row))
        {
            return Err(ModelError::DuplicateRow {
                grid: grid.clone(),
                row: row.clone(),
            });
        }
        for (cell, _) in initial_values.iter() {
            let identity = PropertyIdentity::grid_cell(grid, row, cell);
            match grid_descriptor.find_column(cell) {
                None => return Err(ModelError::UnknownProperty(identity.to_string())),
                Some(column) if column.is_computed() => {
                    return Err(ValidationError::ReadOnly {
                        field: identity.to_string(),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }

        let mut cells = RowCells::new();
        for column in &grid_descriptor.columns {
            let value = if column.is_computed() {
                PropertyValue::Null
            } else {
                let identity = PropertyIdentity::grid_cell(grid, row, &column.name);
                let raw = initial_values.get(&column.name).cloned().unwrap_or_default();
                column.coerce(identity.to_string().as_str(), raw)?
            };
            cells.insert(column.name.clone(), value);
        }
        // Every column counts as changed so each computed column is evaluated.
        let mut changed_cells: Vec<PropertyName> =
            grid_descriptor.columns.iter().map(|c| c.name.clone()).collect();
        let mut row_events = Vec::new();
        recompute_row(grid_descriptor, row, &mut cells, &mut changed_cells, &mut row_events)?;

        let mut staged = self.state.clone();
        let mut events = vec![ModelEvent::GridRowAdded(GridRowAddedEvent {
            grid: grid.clone(),
            row: row.clone(),
            initial_values: row_value_set(&cells),
        })];
        staged
            .grids
            .entry(grid.clone())
            .or_default()
            .insert(row.clone(), cells);
        let mut changed = vec![grid.clone()];
        recompute_fields(&self.descriptor, &mut staged, &mut changed, &mut events)?;

        self.commit(staged, events);
        Ok(())
    }

    /// Current value of a scalar property (or composite grid-cell name).
    /// Never fails; unknown or unset names read as `Null`.
    pub fn get_property_or_null(&self, name: &PropertyName) -> &PropertyValue {
        if let Some(value) = self.state.properties.get(name) {
            return value;
        }
        match self.descriptor.decompose(name) {
            Some((grid, row, cell)) => self.state.grid_cell(&grid, &row, &cell),
            None => &NULL,
        }
    }

    /// Current value of one grid cell; `Null` when unset or unknown.
    pub fn get_grid_property(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
    ) -> &PropertyValue {
        self.state.grid_cell(grid, row, cell)
    }

    /// Values of `names_of_interest` in declaration order. Publishes nothing.
    pub fn get_property_value_snapshot<'a>(
        &self,
        names_of_interest: impl IntoIterator<Item = &'a PropertyName>,
    ) -> PropertyValueSet {
        let wanted: Vec<&PropertyName> = names_of_interest.into_iter().collect();
        self.value_set(|name| wanted.contains(&name))
    }

    /// Values of every declared property and grid.
    pub fn get_all_property_values(&self) -> PropertyValueSet {
        self.value_set(|_| true)
    }

    pub fn next_record(&mut self, policy: OnChangesFound) -> ModelResult<NavigationOutcome> {
        self.navigate(NavigationDirection::Next, policy)
    }

    pub fn previous_record(&mut self, policy: OnChangesFound) -> ModelResult<NavigationOutcome> {
        self.navigate(NavigationDirection::Previous, policy)
    }

    /// Moves one record in `direction`, applying `policy` to unsaved edits.
    ///
    /// The target is resolved first: with no record in `direction` the call
    /// returns `NoRecord` whatever the policy and dirty state.
    ///
    /// # Errors
    /// - `NavigationBlocked` when dirty under `OnChangesFound::Block`.
    /// - `Persistence` when the target record cannot be loaded.
    pub fn navigate(
        &mut self,
        direction: NavigationDirection,
        policy: OnChangesFound,
    ) -> ModelResult<NavigationOutcome> {
        let Some(target) = self.cursor.peek(direction).cloned() else {
            debug!(
                "event=navigate module=window status=no_record direction={}",
                direction.as_str()
            );
            return Ok(NavigationOutcome::NoRecord);
        };

        if self.dirty {
            match policy {
                OnChangesFound::Discard => {
                    debug!("event=navigate module=window status=discarding record={}", self.current);
                }
                OnChangesFound::Ask => {
                    self.publish(ModelEvent::ConfirmDiscardChanges(ConfirmDiscardChangesEvent {
                        direction,
                    }));
                    return Ok(NavigationOutcome::ConfirmationRequested);
                }
                OnChangesFound::Block => return Err(ModelError::NavigationBlocked(direction)),
            }
        }

        self.replace_record(target.clone())?;
        Ok(NavigationOutcome::Moved(target))
    }

    /// Jumps straight to a stored record, dropping unsaved edits.
    pub fn load_record(&mut self, record: &RecordRef) -> ModelResult<()> {
        if !self.cursor.contains(record) {
            return Err(ModelError::Persistence(RepoError::InvalidData(format!(
                "record `{record}` is not stored for window `{}`",
                self.descriptor.window_id()
            ))));
        }
        self.replace_record(record.clone())
    }

    /// Writes the current state through the repository.
    ///
    /// # Errors
    /// `Persistence` when the write fails; state and `dirty` stay unchanged.
    pub fn save_record(&mut self) -> ModelResult<()> {
        let window_id = self.descriptor.window_id();
        if let Err(err) = self
            .repository
            .save(window_id, &self.current, &self.state, &self.session)
        {
            warn!(
                "event=record_save module=window status=error window={window_id} record={} error={err}",
                self.current
            );
            return Err(err.into());
        }

        self.saved = self.state.clone();
        self.dirty = false;
        self.cursor.mark_saved(&self.current);
        info!(
            "event=record_save module=window status=ok window={window_id} record={}",
            self.current
        );
        Ok(())
    }

    /// Restores the last loaded/saved state and clears `dirty`.
    pub fn cancel_record_editing(&mut self) {
        if !self.dirty {
            return;
        }
        self.state = self.saved.clone();
        self.dirty = false;
        debug!("event=record_cancel module=window status=ok record={}", self.current);
        self.publish(self.all_properties_changed());
    }

    fn replace_record(&mut self, target: RecordRef) -> ModelResult<()> {
        let window_id = self.descriptor.window_id().to_string();
        let stored = load_existing(self.repository.as_ref(), &window_id, &target)?;

        self.state = self.descriptor.conform(stored);
        self.saved = self.state.clone();
        self.dirty = false;
        self.cursor.move_to(&target);
        self.current = target;
        info!(
            "event=navigate module=window status=ok window={window_id} record={}",
            self.current
        );
        self.publish(self.all_properties_changed());
        Ok(())
    }

    fn all_properties_changed(&self) -> ModelEvent {
        ModelEvent::AllPropertiesChanged(AllPropertiesChangedEvent {
            values: self.get_all_property_values(),
            has_previous: self.cursor.has_previous(),
            has_next: self.cursor.has_next(),
        })
    }

    fn value_set(&self, mut include: impl FnMut(&PropertyName) -> bool) -> PropertyValueSet {
        let mut values = PropertyValueSet::new();
        for field in self.descriptor.fields() {
            if include(&field.name) {
                values.insert(field.name.clone(), self.state.value(&field.name).clone());
            }
        }
        for grid in self.descriptor.grids() {
            if include(&grid.name) {
                values.insert_grid(grid.name.clone(), self.state.grid_row_values(&grid.name));
            }
        }
        values
    }

    fn commit(&mut self, staged: RecordSnapshot, events: Vec<ModelEvent>) {
        self.state = staged;
        self.dirty = true;
        for event in events {
            self.publish(event);
        }
    }

    fn publish(&self, event: ModelEvent) {
        if let Err(err) = self.bus.publish(&event) {
            warn!(
                "event=model_publish module=window status=error bus_id={} error={err}",
                self.bus.id()
            );
        }
    }
}

impl std::fmt::Debug for RecordModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordModel")
            .field("window", &self.descriptor.window_id())
            .field("record", &self.current)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn load_existing(
    repository: &dyn RecordRepository,
    window_id: &str,
    record: &RecordRef,
) -> ModelResult<RecordSnapshot> {
    repository.load(window_id, record)?.ok_or_else(|| {
        ModelError::Persistence(RepoError::InvalidData(format!(
            "record `{record}` disappeared from window `{window_id}`"
        )))
    })
}

/// Recomputes scalar fields whose dependencies are in `changed`.
///
/// Dependencies always point backwards in declaration order, so a single pass
/// sees every transitive change and evaluates each field at most once.
fn recompute_fields(
    descriptor: &RecordDescriptor,
    staged: &mut RecordSnapshot,
    changed: &mut Vec<PropertyName>,
    events: &mut Vec<ModelEvent>,
) -> ModelResult<()> {
    for field in descriptor.fields() {
        let Some(Computation::Record(compute)) = &field.computation else {
            continue;
        };
        if !field.depends_on.iter().any(|input| changed.contains(input)) {
            continue;
        }
        let value = field.coerce(field.name.as_str(), compute(staged))?;
        if staged.value(&field.name) == &value {
            continue;
        }
        staged.properties.insert(field.name.clone(), value.clone());
        changed.push(field.name.clone());
        events.push(ModelEvent::PropertyChanged(PropertyChangedEvent {
            name: field.name.clone(),
            value,
        }));
    }
    Ok(())
}

/// Row-scoped counterpart of `recompute_fields`.
fn recompute_row(
    grid: &GridDescriptor,
    row: &RowId,
    cells: &mut RowCells,
    changed: &mut Vec<PropertyName>,
    events: &mut Vec<ModelEvent>,
) -> ModelResult<()> {
    for column in &grid.columns {
        let Some(Computation::Row(compute)) = &column.computation else {
            continue;
        };
        if !column.depends_on.iter().any(|input| changed.contains(input)) {
            continue;
        }
        let identity = PropertyIdentity::grid_cell(&grid.name, row, &column.name);
        let value = column.coerce(identity.to_string().as_str(), compute(cells))?;
        if cells.get(&column.name) == Some(&value) {
            continue;
        }
        cells.insert(column.name.clone(), value.clone());
        if !changed.contains(&column.name) {
            changed.push(column.name.clone());
        }
        events.push(ModelEvent::GridPropertyChanged(GridPropertyChangedEvent {
            grid: grid.name.clone(),
            row: row.clone(),
            cell: column.name.clone(),
            value,
        }));
    }
    Ok(())
}
