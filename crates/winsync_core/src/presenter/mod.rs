//! Presentation layer: the view contract and the presenter that mediates it.
//!
//! # Responsibility
//! - Define what a view renders and what it reports back.
//! - Marshal model changes onto the view's execution context.
//!
//! # Invariants
//! - A view is bound to at most one presenter at a time.

pub mod context;
#[allow(clippy::module_inception)]
pub mod presenter;
pub mod view;
