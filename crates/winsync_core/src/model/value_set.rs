//! Ordered property-value snapshots used for bulk view hydration.

use crate::model::property_name::{PropertyName, RowId};
use crate::model::value::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One grid row inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRowValues {
    pub row_id: RowId,
    pub values: PropertyValueSet,
}

/// Ordered name → value snapshot.
///
/// Iteration follows insertion order, which the model keeps equal to
/// declaration order. Grids are kept apart from scalar values; a grid entry
/// holds its rows in row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyValueSet {
    #[serde(default)]
    values: IndexMap<PropertyName, PropertyValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    grids: IndexMap<PropertyName, Vec<GridRowValues>>,
}

impl PropertyValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a scalar value, keeping its first position.
    pub fn insert(&mut self, name: PropertyName, value: PropertyValue) {
        self.values.insert(name, value);
    }

    pub fn with(mut self, name: PropertyName, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &PropertyName) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &PropertyName) -> bool {
        self.values.contains_key(name) || self.grids.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.grids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyName, &PropertyValue)> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &PropertyName> {
        self.values.keys()
    }

    pub fn insert_grid(&mut self, grid: PropertyName, rows: Vec<GridRowValues>) {
        self.grids.insert(grid, rows);
    }

    pub fn grid_rows(&self, grid: &PropertyName) -> Option<&[GridRowValues]> {
        self.grids.get(grid).map(Vec::as_slice)
    }

    pub fn grids(&self) -> impl Iterator<Item = (&PropertyName, &[GridRowValues])> {
        self.grids.iter().map(|(name, rows)| (name, rows.as_slice()))
    }

    /// Returns a copy limited to `names`, preserving this set's order.
    pub fn restricted_to<'a>(
        &self,
        names: impl IntoIterator<Item = &'a PropertyName>,
    ) -> PropertyValueSet {
        let wanted: Vec<&PropertyName> = names.into_iter().collect();
        PropertyValueSet {
            values: self
                .values
                .iter()
                .filter(|(name, _)| wanted.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            grids: self
                .grids
                .iter()
                .filter(|(name, _)| wanted.contains(name))
                .map(|(name, rows)| (name.clone(), rows.clone()))
                .collect(),
        }
    }
}

impl FromIterator<(PropertyName, PropertyValue)> for PropertyValueSet {
    fn from_iter<T: IntoIterator<Item = (PropertyName, PropertyValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
            grids: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GridRowValues, PropertyValueSet};
    use crate::model::property_name::{PropertyName, RowId};
    use crate::model::value::PropertyValue;

    fn name(value: &str) -> PropertyName {
        PropertyName::new(value).unwrap()
    }

    #[test]
    fn keeps_insertion_order_on_replace() {
        let mut set = PropertyValueSet::new()
            .with(name("b"), 1.0)
            .with(name("a"), 2.0);
        set.insert(name("b"), PropertyValue::Number(3.0));

        let order: Vec<&str> = set.names().map(PropertyName::as_str).collect();
        assert_eq!(order, ["b", "a"]);
        assert_eq!(set.get(&name("b")), Some(&PropertyValue::Number(3.0)));
    }

    #[test]
    fn restriction_keeps_requested_scalars_and_grids() {
        let mut set = PropertyValueSet::new()
            .with(name("qty"), 5.0)
            .with(name("price"), 9.0);
        set.insert_grid(
            name("lines"),
            vec![GridRowValues {
                row_id: RowId::new("r1").unwrap(),
                values: PropertyValueSet::new().with(name("qty"), 1.0),
            }],
        );

        let restricted = set.restricted_to([&name("qty"), &name("lines")]);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.get(&name("price")).is_none());
        assert_eq!(restricted.grid_rows(&name("lines")).unwrap().len(), 1);
    }
}
