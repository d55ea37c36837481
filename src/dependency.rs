//! Pairwise column dependencies: how often column `a` has a value while
//! column `b` is missing on the same row.

use crate::meta::{ColumnSet, MetaId, RowValue};

#[derive(Debug, Clone)]
struct Entry {
    present: String,
    missing: String,
    a: MetaId,
    b: MetaId,
    count: usize,
}

/// Final count of one pair. `count` is `None` when either column ended
/// non-numeric and the comparison is meaningless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResult {
    pub present: String,
    pub missing: String,
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    entries: Vec<Entry>,
}

impl DependencyTracker {
    /// Track the pairs whose columns both exist in `columns`.
    pub fn from_pairs(pairs: &[(&str, &str)], columns: &ColumnSet) -> Self {
        let entries = pairs
            .iter()
            .filter_map(|&(present, missing)| {
                let a = columns.id_of(present)?;
                let b = columns.id_of(missing)?;
                Some(Entry {
                    present: present.to_string(),
                    missing: missing.to_string(),
                    a,
                    b,
                    count: 0,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update the counters from the current row.
    pub fn observe(&mut self, columns: &ColumnSet) {
        for entry in &mut self.entries {
            let (Some(a), Some(b)) = (columns.get(entry.a), columns.get(entry.b)) else {
                continue;
            };
            if !a.is_na() && b.is_na() {
                entry.count += 1;
            }
        }
    }

    /// Counts after the columns were finalized.
    pub fn results(&self, columns: &ColumnSet) -> Vec<DependencyResult> {
        let unavailable = |id: MetaId| {
            columns
                .get(id)
                .is_none_or(|meta| meta.is_numeric_family() && !meta.is_numeric())
        };
        self.entries
            .iter()
            .map(|entry| DependencyResult {
                present: entry.present.clone(),
                missing: entry.missing.clone(),
                count: if unavailable(entry.a) || unavailable(entry.b) {
                    None
                } else {
                    Some(entry.count)
                },
            })
            .collect()
    }
}
