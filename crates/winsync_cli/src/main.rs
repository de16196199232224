//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a sales-order window on a SQLite store with a console view.
//! - Replay scripted user actions through the presenter and print what the
//!   view receives.

use clap::Parser;
use log::info;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use winsync_core::{
    init_logging, FieldDescriptor, FieldType, GridDescriptor, PropertyName, PropertyValue,
    PropertyValueSet, Presenter, QueueContext, RecordDescriptor, RecordModel, RowId,
    SessionContext, SqliteRecordRepository, View, ViewContext, ViewListener, WindowConfig,
};

#[derive(Parser)]
#[command(name = "winsync_cli")]
#[command(about = "Replay window actions against a sales-order record", long_about = None)]
struct Cli {
    /// SQLite store; an in-memory store is used when omitted.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Window configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enables file logging into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// `field=value`, `grid.row.cell=value`, `next`, `prev`, `save`, `cancel`,
    /// or `yes`/`no` to answer a discard prompt.
    actions: Vec<String>,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("winsync: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: Cli) -> Result<(), String> {
    let config = match &options.config {
        Some(path) => WindowConfig::load(path).map_err(|err| err.to_string())?,
        None => WindowConfig::for_window("sales_order"),
    };
    if let Some(log_dir) = &options.log_dir {
        init_logging(&config.log_level, log_dir).map_err(|err| err.to_string())?;
    }

    let conn = match &options.db {
        Some(path) => winsync_core::open_db(path),
        None => winsync_core::open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    let descriptor = Arc::new(sales_order(&config.window_id).map_err(|err| err.to_string())?);
    let interest = descriptor.declared_names();
    let model = RecordModel::open(
        descriptor,
        Box::new(SqliteRecordRepository::new(conn)),
        SessionContext::system(),
    )
    .map_err(|err| err.to_string())?
    .into_shared();

    let context: Arc<dyn ViewContext> = Arc::new(QueueContext::for_current_thread());
    let presenter = Presenter::from_config(context, &config);
    presenter.set_view_interest(interest);
    let view = Arc::new(ConsoleView::default());
    presenter.bind(Arc::clone(&model), view.clone());
    info!(
        "event=cli_session module=cli status=ok window={} record={}",
        config.window_id,
        model.lock().current_ref()
    );

    let listener = view.listener().ok_or("view was not bound")?;
    for action in &options.actions {
        println!("> {action}");
        apply_action(listener.as_ref(), action, &config)?;
    }

    presenter.dispose();
    Ok(())
}

fn apply_action(
    listener: &dyn ViewListener,
    action: &str,
    config: &WindowConfig,
) -> Result<(), String> {
    match action {
        "next" => listener.view_next_record(config.on_changes_found),
        "prev" => listener.view_previous_record(config.on_changes_found),
        "save" => listener.view_save_editing(),
        "cancel" => listener.view_cancel_editing(),
        "yes" | "no" => listener.view_discard_changes_confirmed(action == "yes"),
        _ => {
            let (field, raw) = action
                .split_once('=')
                .ok_or_else(|| format!("unrecognized action `{action}`"))?;
            let name = PropertyName::new(field).map_err(|err| err.to_string())?;
            listener.view_property_changed(&name, PropertyValue::text(raw));
        }
    }
    Ok(())
}

fn sales_order(window_id: &str) -> Result<RecordDescriptor, Box<dyn std::error::Error>> {
    let qty = PropertyName::new("qty")?;
    let price = PropertyName::new("price")?;
    let lines = PropertyName::new("lines")?;
    let line_net = PropertyName::new("line_net")?;
    let line_qty = PropertyName::new("line_qty")?;
    let unit_price = PropertyName::new("unit_price")?;

    let descriptor = RecordDescriptor::builder(window_id)
        .field(FieldDescriptor::new(PropertyName::new("customer")?, FieldType::Text))
        .field(FieldDescriptor::new(qty.clone(), FieldType::Number))
        .field(FieldDescriptor::new(price.clone(), FieldType::Number))
        .field(
            FieldDescriptor::new(PropertyName::new("amount")?, FieldType::Number).computed(
                vec![qty.clone(), price.clone()],
                move |record| PropertyValue::Number(record.number(&qty) * record.number(&price)),
            ),
        )
        .field(FieldDescriptor::new(PropertyName::new("delivery")?, FieldType::Date))
        .field(
            FieldDescriptor::new(PropertyName::new("lines_total")?, FieldType::Number).computed(
                vec![lines.clone()],
                {
                    let (lines, line_net) = (lines.clone(), line_net.clone());
                    move |record| PropertyValue::Number(record.sum_column(&lines, &line_net))
                },
            ),
        )
        .grid(
            GridDescriptor::new(lines)
                .column(FieldDescriptor::new(PropertyName::new("product")?, FieldType::Text))
                .column(FieldDescriptor::new(line_qty.clone(), FieldType::Number))
                .column(FieldDescriptor::new(unit_price.clone(), FieldType::Number))
                .column(
                    FieldDescriptor::new(line_net, FieldType::Number).computed_in_row(
                        vec![line_qty.clone(), unit_price.clone()],
                        move |cells| {
                            let number = |cell: &PropertyName| {
                                cells.get(cell).and_then(PropertyValue::as_number).unwrap_or(0.0)
                            };
                            PropertyValue::Number(number(&line_qty) * number(&unit_price))
                        },
                    ),
                ),
        )
        .build()?;
    Ok(descriptor)
}

/// View that prints every push to stdout.
#[derive(Default)]
struct ConsoleView {
    listener: Mutex<Option<Arc<dyn ViewListener>>>,
}

impl ConsoleView {
    fn listener(&self) -> Option<Arc<dyn ViewListener>> {
        self.listener.lock().clone()
    }
}

impl View for ConsoleView {
    fn set_properties(&self, values: &PropertyValueSet) {
        for (name, value) in values.iter() {
            println!("  {name} = {value}");
        }
        for (grid, rows) in values.grids() {
            println!("  {grid}: {} row(s)", rows.len());
        }
    }

    fn set_property(&self, name: &PropertyName, value: &PropertyValue) {
        println!("  {name} <- {value}");
    }

    fn set_grid_property(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: &PropertyValue,
    ) {
        println!("  {grid}[{row}].{cell} <- {value}");
    }

    fn grid_new_row(&self, grid: &PropertyName, row: &RowId, values: &PropertyValueSet) {
        println!("  {grid}: new row {row} ({} cells)", values.len());
    }

    fn set_previous_record_enabled(&self, enabled: bool) {
        println!("  [prev {}]", if enabled { "on" } else { "off" });
    }

    fn set_next_record_enabled(&self, enabled: bool) {
        println!("  [next {}]", if enabled { "on" } else { "off" });
    }

    fn show_error(&self, message: &str) {
        println!("  ! {message}");
    }

    fn confirm_discard_changes(&self) {
        println!("  ? discard unsaved changes (answer with `yes` or `no`)");
    }

    fn commit_changes(&self) {}

    fn set_listener(&self, listener: Option<Arc<dyn ViewListener>>) {
        *self.listener.lock() = listener;
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn flags_and_trailing_actions_parse() {
        let cli = Cli::try_parse_from([
            "winsync_cli",
            "--db",
            "orders.db",
            "qty=3",
            "next",
            "yes",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("orders.db")));
        assert!(cli.config.is_none());
        assert_eq!(cli.actions, ["qty=3", "next", "yes"]);
    }

    #[test]
    fn flag_without_value_is_rejected() {
        assert!(Cli::try_parse_from(["winsync_cli", "--log-dir"]).is_err());
    }
}
