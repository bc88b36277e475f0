//! Condition groups: the objects of one condition kind in analysis order.

use std::collections::BTreeMap;

use crate::condition::{ConditionData, ConditionKind, GeoRef};

/// Parameters carried by one group entry.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupParams {
    /// Host material card.
    Material(BTreeMap<String, String>),
    Condition(ConditionData),
}

/// One analysis object inside a [`ConditionGroup`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub label: String,
    pub references: Vec<GeoRef>,
    pub params: GroupParams,
    /// Whether an empty reference list means "the whole mesh shape".
    pub whole_shape_allowed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub kind: ConditionKind,
    pub entries: Vec<GroupEntry>,
}

impl ConditionGroup {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (entry, reference) pairs, counting a whole-shape entry once.
    pub fn reference_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.references.len().max(usize::from(e.whole_shape_allowed)))
            .sum()
    }
}
