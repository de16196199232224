//! Persisted record shape.
//!
//! # Invariants
//! - A snapshot holds at most one value per `(row, cell)` pair.
//! - Row order inside a grid is insertion order.

use crate::model::property_name::{PropertyName, RowId};
use crate::model::value::PropertyValue;
use crate::model::value_set::{GridRowValues, PropertyValueSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static NULL: PropertyValue = PropertyValue::Null;

/// Cells of one grid row.
pub type RowCells = IndexMap<PropertyName, PropertyValue>;
/// Rows of one grid.
pub type GridRows = IndexMap<RowId, RowCells>;

/// Stable reference of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordRef(String);

impl RecordRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full state of one record: scalar values plus grid rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub properties: IndexMap<PropertyName, PropertyValue>,
    #[serde(default)]
    pub grids: IndexMap<PropertyName, GridRows>,
}

impl RecordSnapshot {
    /// Value of a scalar property; `Null` when unset.
    pub fn value(&self, name: &PropertyName) -> &PropertyValue {
        self.properties.get(name).unwrap_or(&NULL)
    }

    /// Numeric value of a scalar property; `0.0` when unset or not numeric.
    pub fn number(&self, name: &PropertyName) -> f64 {
        self.value(name).as_number().unwrap_or(0.0)
    }

    pub fn grid_rows(&self, grid: &PropertyName) -> Option<&GridRows> {
        self.grids.get(grid)
    }

    pub fn grid_cell(&self, grid: &PropertyName, row: &RowId, cell: &PropertyName) -> &PropertyValue {
        self.grids
            .get(grid)
            .and_then(|rows| rows.get(row))
            .and_then(|cells| cells.get(cell))
            .unwrap_or(&NULL)
    }

    /// Sum of a numeric column over all rows of a grid.
    pub fn sum_column(&self, grid: &PropertyName, cell: &PropertyName) -> f64 {
        self.grids
            .get(grid)
            .map(|rows| {
                rows.values()
                    .filter_map(|cells| cells.get(cell).and_then(PropertyValue::as_number))
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Converts the rows of `grid` to snapshot form for the view.
    pub fn grid_row_values(&self, grid: &PropertyName) -> Vec<GridRowValues> {
        self.grids
            .get(grid)
            .map(|rows| {
                rows.iter()
                    .map(|(row_id, cells)| GridRowValues {
                        row_id: row_id.clone(),
                        values: row_value_set(cells),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub(crate) fn row_value_set(cells: &RowCells) -> PropertyValueSet {
    cells
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{RecordSnapshot, RowCells};
    use crate::model::property_name::{PropertyName, RowId};
    use crate::model::value::PropertyValue;

    #[test]
    fn sums_numeric_cells_and_skips_nulls() {
        let lines = PropertyName::new("lines").unwrap();
        let net = PropertyName::new("net").unwrap();
        let mut snapshot = RecordSnapshot::default();
        let rows = snapshot.grids.entry(lines.clone()).or_default();
        for (row, value) in [("a", PropertyValue::Number(2.5)), ("b", PropertyValue::Null)] {
            let mut cells = RowCells::new();
            cells.insert(net.clone(), value);
            rows.insert(RowId::new(row).unwrap(), cells);
        }

        assert_eq!(snapshot.sum_column(&lines, &net), 2.5);
        assert_eq!(snapshot.grid_row_values(&lines).len(), 2);
    }

    #[test]
    fn snapshot_json_roundtrip_keeps_grid_order() {
        let lines = PropertyName::new("lines").unwrap();
        let mut snapshot = RecordSnapshot::default();
        let rows = snapshot.grids.entry(lines.clone()).or_default();
        rows.insert(RowId::new("z").unwrap(), RowCells::new());
        rows.insert(RowId::new("a").unwrap(), RowCells::new());

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: RecordSnapshot = serde_json::from_str(&json).unwrap();
        let order: Vec<&str> = decoded.grids[&lines].keys().map(|row| row.as_str()).collect();
        assert_eq!(order, ["z", "a"]);
    }
}
