//! Record layout declaration.
//!
//! # Responsibility
//! - Declare the scalar fields, grids and grid columns of one window.
//! - Declare computed fields and the inputs they are recomputed from.
//!
//! # Invariants
//! - Names are unique across scalar fields and grids; column names are unique
//!   within their grid.
//! - A computed field only depends on names declared before it (grids count
//!   as declared for scalar fields), so one pass in declaration order
//!   recomputes every dependent exactly once.

use crate::model::property_name::{PropertyName, PropertyNameError, RowId, SEPARATOR};
use crate::model::snapshot::{RecordSnapshot, RowCells};
use crate::model::value::{CoercionRules, FieldType, PropertyValue, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Computes a scalar field from the whole record.
pub type RecordComputeFn = Arc<dyn Fn(&RecordSnapshot) -> PropertyValue + Send + Sync>;
/// Computes a grid column from the other cells of the same row.
pub type RowComputeFn = Arc<dyn Fn(&RowCells) -> PropertyValue + Send + Sync>;

#[derive(Clone)]
pub enum Computation {
    Record(RecordComputeFn),
    Row(RowComputeFn),
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(_) => f.write_str("Computation::Record"),
            Self::Row(_) => f.write_str("Computation::Row"),
        }
    }
}

/// One declared scalar field or grid column.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: PropertyName,
    pub field_type: FieldType,
    pub mandatory: bool,
    pub allowed_values: Vec<String>,
    pub depends_on: Vec<PropertyName>,
    pub computation: Option<Computation>,
}

impl FieldDescriptor {
    pub fn new(name: PropertyName, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            mandatory: false,
            allowed_values: Vec::new(),
            depends_on: Vec::new(),
            computation: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Scalar field recomputed from the record whenever a dependency changes.
    pub fn computed<F>(mut self, depends_on: Vec<PropertyName>, compute: F) -> Self
    where
        F: Fn(&RecordSnapshot) -> PropertyValue + Send + Sync + 'static,
    {
        self.depends_on = depends_on;
        self.computation = Some(Computation::Record(Arc::new(compute)));
        self
    }

    /// Grid column recomputed from its row whenever a dependency cell changes.
    pub fn computed_in_row<F>(mut self, depends_on: Vec<PropertyName>, compute: F) -> Self
    where
        F: Fn(&RowCells) -> PropertyValue + Send + Sync + 'static,
    {
        self.depends_on = depends_on;
        self.computation = Some(Computation::Row(Arc::new(compute)));
        self
    }

    pub fn is_computed(&self) -> bool {
        self.computation.is_some()
    }

    /// Coerces `raw` with this field's type and rules.
    pub fn coerce(&self, field: &str, raw: PropertyValue) -> Result<PropertyValue, ValidationError> {
        self.field_type.coerce(
            field,
            raw,
            CoercionRules {
                mandatory: self.mandatory,
                allowed_values: &self.allowed_values,
            },
        )
    }
}

/// One declared grid (a named collection of rows).
#[derive(Debug, Clone)]
pub struct GridDescriptor {
    pub name: PropertyName,
    pub columns: Vec<FieldDescriptor>,
}

impl GridDescriptor {
    pub fn new(name: PropertyName) -> Self {
        Self {
            name,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: FieldDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn find_column(&self, cell: &PropertyName) -> Option<&FieldDescriptor> {
        self.columns.iter().find(|column| &column.name == cell)
    }
}

/// Invalid record declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyWindowId,
    DuplicateName(String),
    UnknownDependency { field: String, dependency: String },
    ForwardDependency { field: String, dependency: String },
    WrongComputationKind(String),
    Name(PropertyNameError),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWindowId => write!(f, "window id cannot be empty"),
            Self::DuplicateName(name) => write!(f, "name declared twice: {name}"),
            Self::UnknownDependency { field, dependency } => {
                write!(f, "field `{field}` depends on undeclared `{dependency}`")
            }
            Self::ForwardDependency { field, dependency } => write!(
                f,
                "field `{field}` depends on `{dependency}` which is declared after it"
            ),
            Self::WrongComputationKind(field) => {
                write!(f, "field `{field}` uses a computation of the wrong scope")
            }
            Self::Name(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DescriptorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Name(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PropertyNameError> for DescriptorError {
    fn from(value: PropertyNameError) -> Self {
        Self::Name(value)
    }
}

/// Validated layout of one window's records.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    window_id: String,
    fields: Vec<FieldDescriptor>,
    grids: Vec<GridDescriptor>,
}

impl RecordDescriptor {
    pub fn builder(window_id: impl Into<String>) -> RecordDescriptorBuilder {
        RecordDescriptorBuilder {
            window_id: window_id.into(),
            fields: Vec::new(),
            grids: Vec::new(),
        }
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn grids(&self) -> &[GridDescriptor] {
        &self.grids
    }

    pub fn field(&self, name: &PropertyName) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| &field.name == name)
    }

    pub fn grid(&self, name: &PropertyName) -> Option<&GridDescriptor> {
        self.grids.iter().find(|grid| &grid.name == name)
    }

    /// Every declared top-level name: scalar fields first, then grids.
    pub fn declared_names(&self) -> Vec<PropertyName> {
        self.fields
            .iter()
            .map(|field| field.name.clone())
            .chain(self.grids.iter().map(|grid| grid.name.clone()))
            .collect()
    }

    /// Splits a composite `grid.row.cell` name into its parts.
    ///
    /// Returns `None` when the name does not address a declared grid column.
    pub fn decompose(&self, name: &PropertyName) -> Option<(PropertyName, RowId, PropertyName)> {
        for grid in &self.grids {
            let Some(rest) = name
                .as_str()
                .strip_prefix(grid.name.as_str())
                .and_then(|rest| rest.strip_prefix(SEPARATOR))
            else {
                continue;
            };
            let Some((row, cell)) = rest.split_once(SEPARATOR) else {
                continue;
            };
            let (Ok(row), Ok(cell)) = (RowId::new(row), PropertyName::new(cell)) else {
                continue;
            };
            if grid.find_column(&cell).is_some() {
                return Some((grid.name.clone(), row, cell));
            }
        }
        None
    }

    /// An empty record: every scalar null, every grid without rows.
    pub fn empty_snapshot(&self) -> RecordSnapshot {
        let mut snapshot = RecordSnapshot::default();
        for field in &self.fields {
            snapshot
                .properties
                .insert(field.name.clone(), PropertyValue::Null);
        }
        for grid in &self.grids {
            snapshot.grids.insert(grid.name.clone(), Default::default());
        }
        snapshot
    }

    /// Reshapes a stored snapshot to this layout.
    ///
    /// Declared names missing from `stored` become null, undeclared names are
    /// dropped, and declaration order is restored.
    pub fn conform(&self, stored: RecordSnapshot) -> RecordSnapshot {
        let RecordSnapshot {
            mut properties,
            mut grids,
        } = stored;
        let mut snapshot = RecordSnapshot::default();
        for field in &self.fields {
            let value = properties.swap_remove(&field.name).unwrap_or_default();
            snapshot.properties.insert(field.name.clone(), value);
        }
        for grid in &self.grids {
            let rows = grids.swap_remove(&grid.name).unwrap_or_default();
            let conformed = rows
                .into_iter()
                .map(|(row_id, mut cells)| {
                    let row: RowCells = grid
                        .columns
                        .iter()
                        .map(|column| {
                            let value = cells.swap_remove(&column.name).unwrap_or_default();
                            (column.name.clone(), value)
                        })
                        .collect();
                    (row_id, row)
                })
                .collect();
            snapshot.grids.insert(grid.name.clone(), conformed);
        }
        snapshot
    }
}

pub struct RecordDescriptorBuilder {
    window_id: String,
    fields: Vec<FieldDescriptor>,
    grids: Vec<GridDescriptor>,
}

impl RecordDescriptorBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn grid(mut self, grid: GridDescriptor) -> Self {
        self.grids.push(grid);
        self
    }

    /// Validates names and dependency ordering.
    pub fn build(self) -> Result<RecordDescriptor, DescriptorError> {
        if self.window_id.trim().is_empty() {
            return Err(DescriptorError::EmptyWindowId);
        }

        let grid_names: Vec<&PropertyName> = self.grids.iter().map(|grid| &grid.name).collect();
        let mut seen: Vec<&PropertyName> = Vec::new();
        for grid in &self.grids {
            if seen.contains(&&grid.name) {
                return Err(DescriptorError::DuplicateName(grid.name.to_string()));
            }
            seen.push(&grid.name);
        }

        let mut declared: Vec<&PropertyName> = Vec::new();
        for field in &self.fields {
            if declared.contains(&&field.name) || grid_names.contains(&&field.name) {
                return Err(DescriptorError::DuplicateName(field.name.to_string()));
            }
            if matches!(field.computation, Some(Computation::Row(_))) {
                return Err(DescriptorError::WrongComputationKind(field.name.to_string()));
            }
            check_dependencies(field, &declared, &grid_names, &self.fields)?;
            declared.push(&field.name);
        }

        for grid in &self.grids {
            let mut columns: Vec<&PropertyName> = Vec::new();
            for column in &grid.columns {
                if columns.contains(&&column.name) {
                    return Err(DescriptorError::DuplicateName(format!(
                        "{}.{}",
                        grid.name, column.name
                    )));
                }
                if matches!(column.computation, Some(Computation::Record(_))) {
                    return Err(DescriptorError::WrongComputationKind(format!(
                        "{}.{}",
                        grid.name, column.name
                    )));
                }
                check_dependencies(column, &columns, &[], &grid.columns)?;
                columns.push(&column.name);
            }
        }

        Ok(RecordDescriptor {
            window_id: self.window_id,
            fields: self.fields,
            grids: self.grids,
        })
    }
}

fn check_dependencies(
    field: &FieldDescriptor,
    earlier: &[&PropertyName],
    grids: &[&PropertyName],
    siblings: &[FieldDescriptor],
) -> Result<(), DescriptorError> {
    for dependency in &field.depends_on {
        if earlier.contains(&dependency) || grids.contains(&dependency) {
            continue;
        }
        let error = if siblings.iter().any(|other| &other.name == dependency) {
            DescriptorError::ForwardDependency {
                field: field.name.to_string(),
                dependency: dependency.to_string(),
            }
        } else {
            DescriptorError::UnknownDependency {
                field: field.name.to_string(),
                dependency: dependency.to_string(),
            }
        };
        return Err(error);
    }
    Ok(())
}
