use crate::error::Result;
use crate::expression::Expression;
use crate::meta::numeric::ReportFlags;
use crate::meta::{Accumulate, ColumnSet, MetaId, MetaInfo, MetaNumeric, RowValue};
use crate::plots::PlotFlags;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub meta: MetaId,
    pub predicate: Expression,
}

/// Numeric accumulator over the rows where every dependency holds. Only the
/// current row is consulted.
#[derive(Debug)]
pub struct MetaFiltered {
    inner: MetaNumeric,
    source: MetaId,
    presence: Vec<MetaId>,
    conditions: Vec<FilterCondition>,
    color: Option<String>,
}

impl MetaFiltered {
    pub fn new(info: MetaInfo, source: MetaId, capacity: usize) -> Result<Self> {
        let mut inner = MetaNumeric::new(info, capacity)?;
        inner.set_plots(PlotFlags::NONE);
        Ok(Self {
            inner,
            source,
            presence: Vec::new(),
            conditions: Vec::new(),
            color: None,
        })
    }

    pub fn add_presence(&mut self, meta: MetaId) {
        self.presence.push(meta);
    }

    pub fn add_dependency(&mut self, meta: MetaId, predicate: Expression) {
        self.conditions.push(FilterCondition { meta, predicate });
    }

    pub fn set_plots(&mut self, plots: PlotFlags) {
        self.inner.set_plots(plots);
    }

    pub fn set_output(&mut self, output: ReportFlags) {
        self.inner.set_output(output);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.inner.info_mut().description = Some(description.into());
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = Some(color.into());
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn info(&self) -> &MetaInfo {
        self.inner.info()
    }

    pub fn source(&self) -> MetaId {
        self.source
    }

    pub fn presence(&self) -> &[MetaId] {
        &self.presence
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn numeric(&self) -> &MetaNumeric {
        &self.inner
    }

    pub fn is_numeric(&self) -> bool {
        self.inner.is_numeric()
    }

    pub fn is_na(&self) -> bool {
        self.inner.is_na()
    }

    pub fn value(&self) -> f64 {
        self.inner.value()
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.memory_usage()
    }

    /// Consume the current row. Column metas must already hold this row's tokens.
    pub fn put_row(&mut self, columns: &ColumnSet) -> Result<()> {
        if !self.inner.is_numeric() {
            return Ok(());
        }
        let Some(source) = columns.get(self.source) else {
            self.inner.degrade();
            return Ok(());
        };
        if !source.is_numeric() {
            self.inner.degrade();
            return Ok(());
        }
        if source.is_na() {
            self.inner.put_missing();
            return Ok(());
        }

        for id in &self.presence {
            match columns.get(*id) {
                Some(meta) if meta.is_numeric_family() && !meta.is_numeric() => {
                    self.inner.degrade();
                    return Ok(());
                }
                Some(meta) if !meta.is_na() => {}
                _ => {
                    self.inner.skip_row();
                    return Ok(());
                }
            }
        }

        for condition in &self.conditions {
            let Some(meta) = columns.get(condition.meta) else {
                self.inner.skip_row();
                return Ok(());
            };
            if !meta.is_numeric() {
                self.inner.degrade();
                return Ok(());
            }
            if meta.is_na() || !condition.predicate.evaluate(meta.value()) {
                self.inner.skip_row();
                return Ok(());
            }
        }

        self.inner.put_value(source.value())
    }

    pub fn finalize(&mut self, columns: &ColumnSet) {
        let source_numeric = columns.get(self.source).is_some_and(|m| m.is_numeric());
        if !source_numeric {
            self.inner.degrade();
        }
        self.inner.finalize();
    }
}

impl RowValue for MetaFiltered {
    fn is_numeric(&self) -> bool {
        self.inner.is_numeric()
    }

    fn is_na(&self) -> bool {
        self.inner.is_na()
    }

    fn value(&self) -> f64 {
        self.inner.value()
    }
}
