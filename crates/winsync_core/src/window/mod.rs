//! Editable window model.
//!
//! # Responsibility
//! - Own the state of the record being edited and its lifecycle.
//! - Define the model error taxonomy and navigation policy.

pub mod error;
pub mod navigation;
pub mod record_model;
