//! Model change events and the per-model notifier that delivers them.
//!
//! # Responsibility
//! - Define the typed event union raised by a record model.
//! - Deliver events synchronously to the subscribers of one model.
//!
//! # Invariants
//! - Each record model owns exactly one notifier for its lifetime.

pub mod bus;
pub mod model_event;
