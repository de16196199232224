//! Record model error taxonomy.

use crate::model::property_name::{PropertyName, RowId};
use crate::model::value::ValidationError;
use crate::repo::record_repo::RepoError;
use crate::window::navigation::NavigationDirection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

/// Failure of a record model operation. No state is committed on failure.
#[derive(Debug)]
pub enum ModelError {
    /// Value incompatible with the field's declared type.
    Validation(ValidationError),
    /// Name not declared on this record.
    UnknownProperty(String),
    /// Grid row id already present.
    DuplicateRow { grid: PropertyName, row: RowId },
    /// Repository read/write failed.
    Persistence(RepoError),
    /// Unsaved edits block navigation under the `Block` policy.
    NavigationBlocked(NavigationDirection),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownProperty(name) => write!(f, "unknown property: {name}"),
            Self::DuplicateRow { grid, row } => {
                write!(f, "row `{row}` already exists in grid `{grid}`")
            }
            Self::Persistence(err) => write!(f, "saving or loading the record failed: {err}"),
            Self::NavigationBlocked(direction) => write!(
                f,
                "cannot move to the {} record while there are unsaved changes",
                direction.as_str()
            ),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::UnknownProperty(_) | Self::DuplicateRow { .. } | Self::NavigationBlocked(_) => {
                None
            }
        }
    }
}

impl From<ValidationError> for ModelError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ModelError {
    fn from(value: RepoError) -> Self {
        Self::Persistence(value)
    }
}

/// Message of the innermost error in a `source()` chain.
///
/// This is what users see; wrapper context stays in the logs.
pub fn root_cause_message(err: &(dyn Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
