//! Per-column streaming accumulators ("metas").
//!
//! One [`ColumnMeta`] is created for every recognised header column. Each data
//! row is first dispatched token by token into the column metas; derived metas
//! ([`MetaFiltered`], [`MetaRatio`], [`MetaCrossTable`]) then read the row state
//! that the column metas expose through [`RowValue`].

use std::collections::HashMap;

use crate::error::Result;
use crate::types::DEFAULT_MISSING;

pub mod crosstable;
pub mod filtered;
pub mod format;
pub mod group;
pub mod numeric;
pub mod ratio;
pub mod uniqueness;

pub use crosstable::MetaCrossTable;
pub use filtered::MetaFiltered;
pub use format::MetaFormat;
pub use group::MetaGroup;
pub use numeric::{MetaNumeric, NumericVariant, PlausibleRange};
pub use ratio::MetaRatio;
pub use uniqueness::MetaUniqueness;

pub const HEAP_SIZE: usize = 2_800_000;
// Growth step of a full sample buffer.
pub const HEAP_INCREMENT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaRef {
    Column(MetaId),
    Filtered(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaInfo {
    pub common_name: String,
    pub actual_name: String,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub na_marker: String,
}

impl MetaInfo {
    pub fn new(common_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            actual_name: actual_name.into(),
            full_name: None,
            description: None,
            na_marker: DEFAULT_MISSING.to_string(),
        }
    }

    pub fn with_na_marker(mut self, marker: impl Into<String>) -> Self {
        self.na_marker = marker.into();
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_na_token(&self, token: &str) -> bool {
        token == self.na_marker
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.actual_name)
    }
}

pub trait Accumulate {
    fn info(&self) -> &MetaInfo;

    fn put(&mut self, token: &str) -> Result<()>;

    /// Compute final statistics. Called once after the last row.
    fn finalize(&mut self);

    fn is_na(&self) -> bool;

    fn memory_usage(&self) -> usize;
}

pub trait RowValue {
    fn is_numeric(&self) -> bool;
    fn is_na(&self) -> bool;
    fn value(&self) -> f64;
}

#[derive(Debug)]
pub enum ColumnMeta {
    Numeric(MetaNumeric),
    Group(MetaGroup),
    Uniqueness(MetaUniqueness),
    Format(MetaFormat),
}

impl ColumnMeta {
    fn accumulator(&self) -> &dyn Accumulate {
        match self {
            ColumnMeta::Numeric(m) => m,
            ColumnMeta::Group(m) => m,
            ColumnMeta::Uniqueness(m) => m,
            ColumnMeta::Format(m) => m,
        }
    }

    fn accumulator_mut(&mut self) -> &mut dyn Accumulate {
        match self {
            ColumnMeta::Numeric(m) => m,
            ColumnMeta::Group(m) => m,
            ColumnMeta::Uniqueness(m) => m,
            ColumnMeta::Format(m) => m,
        }
    }

    pub fn info(&self) -> &MetaInfo {
        self.accumulator().info()
    }

    pub fn common_name(&self) -> &str {
        &self.info().common_name
    }

    pub fn put(&mut self, token: &str) -> Result<()> {
        self.accumulator_mut().put(token)
    }

    pub fn finalize(&mut self) {
        self.accumulator_mut().finalize()
    }

    pub fn is_na(&self) -> bool {
        self.accumulator().is_na()
    }

    pub fn memory_usage(&self) -> usize {
        self.accumulator().memory_usage()
    }

    /// Numeric and format metas; the ones that can degrade to non-numeric.
    pub fn is_numeric_family(&self) -> bool {
        matches!(self, ColumnMeta::Numeric(_) | ColumnMeta::Format(_))
    }

    pub fn as_numeric(&self) -> Option<&MetaNumeric> {
        match self {
            ColumnMeta::Numeric(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&MetaGroup> {
        match self {
            ColumnMeta::Group(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_uniqueness(&self) -> Option<&MetaUniqueness> {
        match self {
            ColumnMeta::Uniqueness(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_format(&self) -> Option<&MetaFormat> {
        match self {
            ColumnMeta::Format(m) => Some(m),
            _ => None,
        }
    }
}

impl RowValue for ColumnMeta {
    fn is_numeric(&self) -> bool {
        match self {
            ColumnMeta::Numeric(m) => m.is_numeric(),
            ColumnMeta::Format(m) => m.is_numeric(),
            ColumnMeta::Group(_) | ColumnMeta::Uniqueness(_) => false,
        }
    }

    fn is_na(&self) -> bool {
        self.accumulator().is_na()
    }

    fn value(&self) -> f64 {
        match self {
            ColumnMeta::Numeric(m) => m.value(),
            ColumnMeta::Format(m) => m.value(),
            ColumnMeta::Group(_) | ColumnMeta::Uniqueness(_) => f64::NAN,
        }
    }
}

/// Column metas of one file, aligned with the header. Unrecognised columns
/// occupy an empty slot so that token positions map directly to slots.
#[derive(Debug, Default)]
pub struct ColumnSet {
    slots: Vec<Option<ColumnMeta>>,
    by_name: HashMap<String, MetaId>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, meta: Option<ColumnMeta>) -> MetaId {
        let id = MetaId(self.slots.len());
        if let Some(meta) = &meta {
            self.by_name
                .entry(meta.common_name().to_string())
                .or_insert(id);
        }
        self.slots.push(meta);
        id
    }

    pub fn width(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: MetaId) -> Option<&ColumnMeta> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn id_of(&self, common_name: &str) -> Option<MetaId> {
        self.by_name.get(common_name).copied()
    }

    pub fn by_name(&self, common_name: &str) -> Option<&ColumnMeta> {
        self.id_of(common_name).and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetaId, &ColumnMeta)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (MetaId(i), m)))
    }

    /// Dispatch one row of tokens. The caller checks the token count.
    pub fn put_row<'a, I>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for (slot, token) in self.slots.iter_mut().zip(tokens) {
            if let Some(meta) = slot {
                meta.put(token)?;
            }
        }
        Ok(())
    }

    pub fn finalize(&mut self) {
        for meta in self.slots.iter_mut().flatten() {
            meta.finalize();
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.slots.iter().flatten().map(ColumnMeta::memory_usage).sum()
    }
}

pub struct RowView<'a> {
    pub columns: &'a ColumnSet,
    pub filtered: &'a [MetaFiltered],
}

impl<'a> RowView<'a> {
    pub fn get(&self, meta: MetaRef) -> Option<&'a dyn RowValue> {
        match meta {
            MetaRef::Column(id) => self.columns.get(id).map(|m| m as &dyn RowValue),
            MetaRef::Filtered(idx) => self.filtered.get(idx).map(|m| m as &dyn RowValue),
        }
    }
}
