//! Request-scoped identity of the user editing a window.
//!
//! Passed explicitly from the window session down to repository writes;
//! nothing in this crate reads client/org/user from process-global state.

use serde::{Deserialize, Serialize};

/// Client, organization and user on whose behalf records are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub client_id: i64,
    pub org_id: i64,
    pub user: String,
}

impl SessionContext {
    pub fn new(client_id: i64, org_id: i64, user: impl Into<String>) -> Self {
        Self {
            client_id,
            org_id,
            user: user.into(),
        }
    }

    /// Identity used by tools and tests that run outside a login.
    pub fn system() -> Self {
        Self::new(0, 0, "system")
    }
}
