//! Repository layer between the window model and storage.
//!
//! # Responsibility
//! - Define the persistence contract consumed by `RecordModel`.
//! - Keep SQLite query details out of the model and presenter.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`InvalidData`) in addition to DB
//!   transport errors.

pub mod record_repo;
