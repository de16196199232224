//! Property identifiers.
//!
//! # Responsibility
//! - Provide the interned, hierarchical `PropertyName` used as mapping key.
//! - Provide `RowId` and the composite `PropertyIdentity` of a grid cell.
//!
//! # Invariants
//! - A `PropertyName` is non-empty and every `.`-separated segment is non-empty.
//! - A `RowId` never contains `.`, so `grid.row.cell` always decomposes.
//! - Two names are equal iff their path strings are equal.
//! - The intern pool only keeps names that are still alive; dead entries are
//!   pruned before the pool grows past twice its live size.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Path separator between name segments.
pub const SEPARATOR: char = '.';

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid segment regex"));

const PRUNE_FLOOR: usize = 256;

struct InternPool {
    names: HashMap<Box<str>, Weak<str>>,
    prune_at: usize,
}

static INTERNER: Lazy<Mutex<InternPool>> = Lazy::new(|| {
    Mutex::new(InternPool {
        names: HashMap::new(),
        prune_at: PRUNE_FLOOR,
    })
});

fn intern(path: &str) -> Arc<str> {
    let mut pool = INTERNER.lock();
    if let Some(existing) = pool.names.get(path).and_then(Weak::upgrade) {
        return existing;
    }
    if pool.names.len() >= pool.prune_at {
        pool.names.retain(|_, name| name.strong_count() > 0);
        pool.prune_at = (pool.names.len() * 2).max(PRUNE_FLOOR);
    }
    let interned: Arc<str> = Arc::from(path);
    pool.names.insert(Box::from(path), Arc::downgrade(&interned));
    interned
}

#[cfg(test)]
fn pool_size() -> usize {
    INTERNER.lock().names.len()
}

/// Invalid property name or row id input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyNameError {
    Empty,
    InvalidSegment { path: String, segment: String },
    InvalidRowId(String),
}

impl Display for PropertyNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "property name cannot be empty"),
            Self::InvalidSegment { path, segment } => {
                write!(f, "invalid segment `{segment}` in property name `{path}`")
            }
            Self::InvalidRowId(value) => write!(f, "invalid grid row id `{value}`"),
        }
    }
}

impl Error for PropertyNameError {}

/// Interned hierarchical property path, e.g. `lines.row3.qty`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyName(Arc<str>);

impl PropertyName {
    /// Parses and interns a property path.
    ///
    /// # Errors
    /// - `Empty` for blank input.
    /// - `InvalidSegment` when a segment is empty or has characters outside
    ///   `[A-Za-z0-9_-]`.
    pub fn new(path: &str) -> Result<Self, PropertyNameError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PropertyNameError::Empty);
        }
        for segment in trimmed.split(SEPARATOR) {
            if !SEGMENT_RE.is_match(segment) {
                return Err(PropertyNameError::InvalidSegment {
                    path: trimmed.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(intern(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Returns the enclosing path, or `None` for a single-segment name.
    pub fn parent(&self) -> Option<PropertyName> {
        let (head, _) = self.0.rsplit_once(SEPARATOR)?;
        Some(Self(intern(head)))
    }

    /// Appends one or more segments.
    pub fn child(&self, segment: &str) -> Result<PropertyName, PropertyNameError> {
        Self::new(&format!("{}{SEPARATOR}{}", self.0, segment))
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }
}

impl std::fmt::Debug for PropertyName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PropertyName({})", self.0)
    }
}

impl Display for PropertyName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PropertyName {
    type Err = PropertyNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for PropertyName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PropertyName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Grid row identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(value: impl Into<String>) -> Result<Self, PropertyNameError> {
        let value = value.into();
        if !SEGMENT_RE.is_match(&value) {
            return Err(PropertyNameError::InvalidRowId(value));
        }
        Ok(Self(value))
    }

    /// Fresh random row id for rows created in the window.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Identity of one value slot: a scalar property or a single grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyIdentity {
    Scalar(PropertyName),
    GridCell {
        grid: PropertyName,
        row: RowId,
        cell: PropertyName,
    },
}

impl PropertyIdentity {
    pub fn grid_cell(grid: &PropertyName, row: &RowId, cell: &PropertyName) -> Self {
        Self::GridCell {
            grid: grid.clone(),
            row: row.clone(),
            cell: cell.clone(),
        }
    }

    /// Flat name of this identity; grid cells render as `grid.row.cell`.
    pub fn to_property_name(&self) -> PropertyName {
        match self {
            Self::Scalar(name) => name.clone(),
            Self::GridCell { grid, row, cell } => PropertyName(intern(&format!(
                "{grid}{SEPARATOR}{row}{SEPARATOR}{cell}"
            ))),
        }
    }
}

impl Display for PropertyIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(name) => write!(f, "{name}"),
            Self::GridCell { grid, row, cell } => {
                write!(f, "{grid}{SEPARATOR}{row}{SEPARATOR}{cell}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{pool_size, PropertyIdentity, PropertyName, PropertyNameError, RowId, PRUNE_FLOOR};
    use std::sync::Arc;

    #[test]
    fn equal_paths_share_one_interned_allocation() {
        let a = PropertyName::new("lines.qty").unwrap();
        let b = PropertyName::new(" lines.qty ").unwrap();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn rejects_empty_names_and_segments() {
        assert_eq!(PropertyName::new("  ").unwrap_err(), PropertyNameError::Empty);
        assert!(matches!(
            PropertyName::new("lines..qty").unwrap_err(),
            PropertyNameError::InvalidSegment { .. }
        ));
    }

    #[test]
    fn hierarchy_helpers_walk_segments() {
        let name = PropertyName::new("order.lines.qty").unwrap();
        assert_eq!(name.segments().collect::<Vec<_>>(), ["order", "lines", "qty"]);
        assert_eq!(name.parent().unwrap().as_str(), "order.lines");
        assert_eq!(name.last_segment(), "qty");
        assert!(PropertyName::new("qty").unwrap().parent().is_none());
        assert_eq!(
            PropertyName::new("order").unwrap().child("total").unwrap().as_str(),
            "order.total"
        );
    }

    #[test]
    fn row_id_cannot_contain_separator() {
        assert!(RowId::new("row.1").is_err());
        assert!(RowId::new("").is_err());
        assert_eq!(RowId::new("row3").unwrap().as_str(), "row3");
        assert!(!RowId::generate().as_str().contains('.'));
    }

    #[test]
    fn grid_cell_identity_renders_composite_name() {
        let identity = PropertyIdentity::grid_cell(
            &PropertyName::new("lines").unwrap(),
            &RowId::new("row3").unwrap(),
            &PropertyName::new("qty").unwrap(),
        );
        assert_eq!(identity.to_property_name().as_str(), "lines.row3.qty");
    }

    #[test]
    fn transient_grid_cell_names_do_not_accumulate_in_pool() {
        let lines = PropertyName::new("lines").unwrap();
        let qty = PropertyName::new("qty").unwrap();
        for _ in 0..10_000 {
            let identity = PropertyIdentity::grid_cell(&lines, &RowId::generate(), &qty);
            let _rendered = identity.to_string();
            let _name = identity.to_property_name();
        }
        assert!(pool_size() < PRUNE_FLOOR * 4, "pool holds {} names", pool_size());
    }

    #[test]
    fn display_matches_flat_name() {
        let identity = PropertyIdentity::grid_cell(
            &PropertyName::new("lines").unwrap(),
            &RowId::new("r1").unwrap(),
            &PropertyName::new("qty").unwrap(),
        );
        assert_eq!(identity.to_string(), identity.to_property_name().as_str());
        let scalar = PropertyIdentity::Scalar(PropertyName::new("qty").unwrap());
        assert_eq!(scalar.to_string(), "qty");
    }
}
