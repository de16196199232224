//! Core of the winsync window engine.
//! Keeps an editable record model and its view consistent in both directions.

pub mod config;
pub mod db;
pub mod event;
pub mod logging;
pub mod model;
pub mod presenter;
pub mod repo;
pub mod session;
pub mod window;

pub use config::{ConfigError, InterestFilterMode, WindowConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use event::bus::{BusError, ChangeNotifier, EventCollector, ListenerError, ModelListener};
pub use event::model_event::ModelEvent;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::descriptor::{FieldDescriptor, GridDescriptor, RecordDescriptor};
pub use model::property_name::{PropertyIdentity, PropertyName, RowId};
pub use model::snapshot::{RecordRef, RecordSnapshot};
pub use model::value::{FieldType, PropertyValue, ValidationError};
pub use model::value_set::{GridRowValues, PropertyValueSet};
pub use presenter::context::{ContextError, QueueContext, ThreadContext, ViewContext};
pub use presenter::presenter::Presenter;
pub use presenter::view::{ValueFuture, View, ViewListener};
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use session::SessionContext;
pub use window::error::{root_cause_message, ModelError, ModelResult};
pub use window::navigation::{NavigationDirection, NavigationOutcome, OnChangesFound};
pub use window::record_model::{RecordModel, SharedModel};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
