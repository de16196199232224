//! Change notifications raised by a record model.
//!
//! Events carry the committed values, so a subscriber never has to read the
//! model back while the model is still publishing.

use crate::model::property_name::{PropertyIdentity, PropertyName, RowId};
use crate::model::value::PropertyValue;
use crate::model::value_set::PropertyValueSet;
use crate::window::navigation::NavigationDirection;

/// Events published on a model's change notifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A scalar property changed value.
    PropertyChanged(PropertyChangedEvent),

    /// One grid cell changed value.
    GridPropertyChanged(GridPropertyChangedEvent),

    /// A row was appended to a grid.
    GridRowAdded(GridRowAddedEvent),

    /// The whole record was replaced (navigation, cancel).
    AllPropertiesChanged(AllPropertiesChangedEvent),

    /// Navigation needs the user to confirm that unsaved edits are dropped.
    ConfirmDiscardChanges(ConfirmDiscardChangesEvent),
}

impl ModelEvent {
    /// Identity of the value slot this event updates, if it updates one.
    pub fn identity(&self) -> Option<PropertyIdentity> {
        match self {
            Self::PropertyChanged(event) => Some(PropertyIdentity::Scalar(event.name.clone())),
            Self::GridPropertyChanged(event) => Some(PropertyIdentity::grid_cell(
                &event.grid,
                &event.row,
                &event.cell,
            )),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PropertyChanged(_) => "property_changed",
            Self::GridPropertyChanged(_) => "grid_property_changed",
            Self::GridRowAdded(_) => "grid_row_added",
            Self::AllPropertiesChanged(_) => "all_properties_changed",
            Self::ConfirmDiscardChanges(_) => "confirm_discard_changes",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangedEvent {
    pub name: PropertyName,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPropertyChangedEvent {
    pub grid: PropertyName,
    pub row: RowId,
    pub cell: PropertyName,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRowAddedEvent {
    pub grid: PropertyName,
    pub row: RowId,
    /// Full coerced row, including computed columns.
    pub initial_values: PropertyValueSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllPropertiesChangedEvent {
    /// Every declared property of the new record state.
    pub values: PropertyValueSet,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmDiscardChangesEvent {
    /// Navigation that is waiting for the confirmation.
    pub direction: NavigationDirection,
}
