//! Record navigation policy and cursor.

use crate::model::snapshot::RecordRef;
use serde::{Deserialize, Serialize};

/// What navigation does when the current record has unsaved edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnChangesFound {
    /// Drop the edits and move on.
    Discard,
    /// Ask the user first; nothing moves until confirmed.
    #[default]
    Ask,
    /// Refuse to move.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationDirection {
    Next,
    Previous,
}

impl NavigationDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

/// Result of a navigation request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Moved(RecordRef),
    /// `ConfirmDiscardChanges` was published; the record did not change.
    ConfirmationRequested,
    /// Nothing in that direction.
    NoRecord,
}

/// Position of the current record in the window's stored sequence.
///
/// A record that was never saved sits past the end of `refs`.
#[derive(Debug, Clone, Default)]
pub struct NavigationCursor {
    refs: Vec<RecordRef>,
    position: usize,
}

impl NavigationCursor {
    pub fn new(refs: Vec<RecordRef>, current: &RecordRef) -> Self {
        let position = refs
            .iter()
            .position(|candidate| candidate == current)
            .unwrap_or(refs.len());
        Self { refs, position }
    }

    pub fn has_next(&self) -> bool {
        self.position + 1 < self.refs.len()
    }

    pub fn has_previous(&self) -> bool {
        self.position > 0 && !self.refs.is_empty()
    }

    /// Reference one step in `direction`, without moving.
    pub fn peek(&self, direction: NavigationDirection) -> Option<&RecordRef> {
        match direction {
            NavigationDirection::Next if self.has_next() => self.refs.get(self.position + 1),
            NavigationDirection::Previous if self.has_previous() => {
                self.refs.get(self.position - 1)
            }
            _ => None,
        }
    }

    /// Moves onto `record`; returns `false` when it is not in the sequence.
    pub fn move_to(&mut self, record: &RecordRef) -> bool {
        match self.refs.iter().position(|candidate| candidate == record) {
            Some(index) => {
                self.position = index;
                true
            }
            None => false,
        }
    }

    /// Records that `record` is now stored; new records are appended.
    pub fn mark_saved(&mut self, record: &RecordRef) {
        if !self.move_to(record) {
            self.refs.push(record.clone());
            self.position = self.refs.len() - 1;
        }
    }

    pub fn contains(&self, record: &RecordRef) -> bool {
        self.refs.contains(record)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{NavigationCursor, NavigationDirection};
    use crate::model::snapshot::RecordRef;

    fn refs(ids: &[&str]) -> Vec<RecordRef> {
        ids.iter().map(|id| RecordRef::new(*id)).collect()
    }

    #[test]
    fn bounds_follow_position() {
        let cursor = NavigationCursor::new(refs(&["a", "b", "c"]), &RecordRef::new("a"));
        assert!(cursor.has_next());
        assert!(!cursor.has_previous());
        assert_eq!(
            cursor.peek(NavigationDirection::Next),
            Some(&RecordRef::new("b"))
        );
        assert_eq!(cursor.peek(NavigationDirection::Previous), None);
    }

    #[test]
    fn unsaved_record_sits_after_the_last_one() {
        let mut cursor = NavigationCursor::new(refs(&["a", "b"]), &RecordRef::new("new"));
        assert!(!cursor.has_next());
        assert_eq!(
            cursor.peek(NavigationDirection::Previous),
            Some(&RecordRef::new("b"))
        );

        cursor.mark_saved(&RecordRef::new("new"));
        assert_eq!(cursor.len(), 3);
        assert!(cursor.has_previous());
        assert!(!cursor.has_next());
    }

    #[test]
    fn empty_sequence_has_no_neighbours() {
        let cursor = NavigationCursor::new(Vec::new(), &RecordRef::new("new"));
        assert!(!cursor.has_next());
        assert!(!cursor.has_previous());
    }
}
