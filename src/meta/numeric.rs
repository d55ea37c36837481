use std::mem::size_of;

use tracing::debug;

use crate::error::{QcError, Result};
use crate::meta::{Accumulate, HEAP_INCREMENT, MetaInfo, RowValue};
use crate::plots::{Boxplot, HISTOGRAM_BINS, Histogram, PlotFlags, QqPlot};
use crate::stats::{self, Moments};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedToken {
    Value(f64),
    /// `NA` or a NaN literal.
    Missing,
    Invalid,
}

/// Locale-independent number parser. Leading whitespace is skipped, anything
/// after the number (including trailing whitespace) makes the token invalid.
pub fn parse_token(token: &str) -> ParsedToken {
    let trimmed = token.trim_start();
    if trimmed.is_empty() {
        return ParsedToken::Invalid;
    }
    if trimmed == "NA" {
        return ParsedToken::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_nan() => ParsedToken::Missing,
        Ok(value) => ParsedToken::Value(value),
        Err(_) => ParsedToken::Invalid,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericVariant {
    Plain,
    Implausible,
    ImplausibleStrict,
    ImplausibleStrictAdjusted,
}

/// Accepted range `[less, greater]` of an implausible-value checking meta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub less: f64,
    pub greater: f64,
    /// Out-of-range values are excluded from plots as well as statistics.
    pub strict: bool,
    /// Values above this are replaced by `1 - value` before the range test.
    pub fold_above: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFlags {
    pub min: bool,
    pub max: bool,
    pub median: bool,
    pub skewness: bool,
    pub kurtosis: bool,
    pub quantiles: bool,
}

impl Default for ReportFlags {
    fn default() -> Self {
        Self {
            min: true,
            max: true,
            median: true,
            skewness: true,
            kurtosis: true,
            quantiles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub quantiles: [(f64, f64); 9],
}

#[derive(Debug)]
pub struct MetaNumeric {
    info: MetaInfo,
    range: Option<PlausibleRange>,
    numeric: bool,
    na_value: bool,
    value: f64,
    n: usize,
    na: usize,
    n_less: usize,
    n_greater: usize,
    data: Vec<f64>,
    rejected: Vec<f64>,
    summary: Option<NumericSummary>,
    plots: PlotFlags,
    output: ReportFlags,
    histogram: Option<Histogram>,
    boxplot: Option<Boxplot>,
    qqplot: Option<QqPlot>,
    lambda: Option<f64>,
    finalized: bool,
}

impl MetaNumeric {
    pub fn new(info: MetaInfo, capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| QcError::allocation(&info.actual_name, capacity, size_of::<f64>()))?;
        Ok(Self {
            info,
            range: None,
            numeric: true,
            na_value: false,
            value: f64::NAN,
            n: 0,
            na: 0,
            n_less: 0,
            n_greater: 0,
            data,
            rejected: Vec::new(),
            summary: None,
            plots: PlotFlags::default(),
            output: ReportFlags::default(),
            histogram: None,
            boxplot: None,
            qqplot: None,
            lambda: None,
            finalized: false,
        })
    }

    pub fn implausible(info: MetaInfo, less: f64, greater: f64, capacity: usize) -> Result<Self> {
        Self::with_range(info, capacity, PlausibleRange {
            less,
            greater,
            strict: false,
            fold_above: None,
        })
    }

    pub fn implausible_strict(
        info: MetaInfo,
        less: f64,
        greater: f64,
        capacity: usize,
    ) -> Result<Self> {
        Self::with_range(info, capacity, PlausibleRange {
            less,
            greater,
            strict: true,
            fold_above: None,
        })
    }

    pub fn implausible_strict_adjusted(
        info: MetaInfo,
        less: f64,
        greater: f64,
        threshold: f64,
        capacity: usize,
    ) -> Result<Self> {
        Self::with_range(info, capacity, PlausibleRange {
            less,
            greater,
            strict: true,
            fold_above: Some(threshold),
        })
    }

    fn with_range(info: MetaInfo, capacity: usize, range: PlausibleRange) -> Result<Self> {
        let mut meta = Self::new(info, capacity)?;
        meta.range = Some(range);
        Ok(meta)
    }

    pub fn variant(&self) -> NumericVariant {
        match self.range {
            None => NumericVariant::Plain,
            Some(PlausibleRange {
                fold_above: Some(_),
                ..
            }) => NumericVariant::ImplausibleStrictAdjusted,
            Some(PlausibleRange { strict: true, .. }) => NumericVariant::ImplausibleStrict,
            Some(_) => NumericVariant::Implausible,
        }
    }

    pub fn info_mut(&mut self) -> &mut MetaInfo {
        &mut self.info
    }

    pub fn set_plots(&mut self, plots: PlotFlags) {
        self.plots = plots;
    }

    pub fn plots(&self) -> PlotFlags {
        self.plots
    }

    pub fn set_output(&mut self, output: ReportFlags) {
        self.output = output;
    }

    pub fn output(&self) -> ReportFlags {
        self.output
    }

    pub fn range(&self) -> Option<&PlausibleRange> {
        self.range.as_ref()
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn is_na(&self) -> bool {
        self.na_value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn na_count(&self) -> usize {
        self.na
    }

    pub fn n_less(&self) -> usize {
        self.n_less
    }

    pub fn n_greater(&self) -> usize {
        self.n_greater
    }

    pub fn summary(&self) -> Option<&NumericSummary> {
        self.summary.as_ref()
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    pub fn boxplot(&self) -> Option<&Boxplot> {
        self.boxplot.as_ref()
    }

    pub fn qqplot(&self) -> Option<&QqPlot> {
        self.qqplot.as_ref()
    }

    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn put_missing(&mut self) {
        self.na_value = true;
        self.na += 1;
        self.value = f64::NAN;
    }

    /// Feed an already parsed value; NaN counts as missing.
    pub fn put_value(&mut self, value: f64) -> Result<()> {
        if !self.numeric {
            return Ok(());
        }
        if value.is_nan() {
            self.put_missing();
            return Ok(());
        }
        self.na_value = false;
        let value = match self.range {
            Some(PlausibleRange {
                fold_above: Some(threshold),
                ..
            }) if value > threshold => 1.0 - value,
            _ => value,
        };
        self.value = value;

        if let Some(range) = self.range {
            if value < range.less {
                self.n_less += 1;
                return self.reject(value, range.strict);
            }
            if value > range.greater {
                self.n_greater += 1;
                return self.reject(value, range.strict);
            }
        }

        self.push_sample(value)
    }

    /// Clear the current row without counting it, for derived metas that skip a row.
    pub(crate) fn skip_row(&mut self) {
        self.na_value = true;
        self.value = f64::NAN;
    }

    pub fn degrade(&mut self) {
        if self.numeric {
            debug!(column = %self.info.actual_name, "column degraded to non-numeric");
        }
        self.numeric = false;
        self.na_value = true;
        self.value = f64::NAN;
        self.data = Vec::new();
        self.rejected = Vec::new();
        self.summary = None;
        self.histogram = None;
        self.boxplot = None;
        self.qqplot = None;
        self.lambda = None;
    }

    fn reject(&mut self, value: f64, strict: bool) -> Result<()> {
        if !strict {
            self.rejected.try_reserve(1).map_err(|_| {
                QcError::allocation(&self.info.actual_name, self.rejected.len() + 1, size_of::<f64>())
            })?;
            self.rejected.push(value);
        }
        Ok(())
    }

    fn push_sample(&mut self, value: f64) -> Result<()> {
        if self.data.len() == self.data.capacity() {
            let requested = self.data.capacity() + HEAP_INCREMENT;
            self.data
                .try_reserve_exact(HEAP_INCREMENT)
                .map_err(|_| QcError::allocation(&self.info.actual_name, requested, size_of::<f64>()))?;
        }
        self.data.push(value);
        self.n += 1;
        Ok(())
    }

    fn finalize_samples(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        if !self.numeric || self.n == 0 {
            self.degrade();
            return;
        }

        let mut data = std::mem::take(&mut self.data);
        stats::sort_samples(&mut data);
        let Moments {
            mean,
            sd,
            skewness,
            kurtosis,
        } = stats::moments(&data);
        let quantiles = stats::fixed_quantiles(&data);
        let median = stats::median_sorted(&data);
        self.summary = Some(NumericSummary {
            n: data.len(),
            mean,
            sd,
            skewness,
            kurtosis,
            min: data[0],
            max: data[data.len() - 1],
            median,
            quantiles,
        });

        if self.plots.histogram || self.plots.boxplot {
            let mut rejected = std::mem::take(&mut self.rejected);
            let plotted: &[f64] = if rejected.is_empty() {
                &data
            } else {
                rejected.extend_from_slice(&data);
                stats::sort_samples(&mut rejected);
                &rejected
            };
            if self.plots.histogram {
                self.histogram = Histogram::from_sorted(plotted, HISTOGRAM_BINS);
            }
            if self.plots.boxplot {
                let q = [quantiles[0].1, quantiles[3].1, quantiles[4].1, quantiles[5].1, quantiles[8].1];
                self.boxplot = Boxplot::from_sorted(plotted, q);
            }
        }
        if self.plots.qqplot {
            let lambda = stats::inflation_factor(&data);
            self.lambda = Some(lambda);
            self.qqplot = Some(QqPlot::from_sorted(&data, lambda));
        }
        self.rejected = Vec::new();
    }
}

impl Accumulate for MetaNumeric {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn put(&mut self, token: &str) -> Result<()> {
        if !self.numeric {
            return Ok(());
        }
        if self.info.is_na_token(token) {
            self.put_missing();
            return Ok(());
        }
        match parse_token(token) {
            ParsedToken::Value(value) => self.put_value(value),
            ParsedToken::Missing => {
                self.put_missing();
                Ok(())
            }
            ParsedToken::Invalid => {
                self.degrade();
                Ok(())
            }
        }
    }

    fn finalize(&mut self) {
        self.finalize_samples();
    }

    fn is_na(&self) -> bool {
        self.na_value
    }

    fn memory_usage(&self) -> usize {
        (self.data.capacity() + self.rejected.capacity()) * size_of::<f64>()
    }
}

impl RowValue for MetaNumeric {
    fn is_numeric(&self) -> bool {
        self.numeric
    }

    fn is_na(&self) -> bool {
        self.na_value
    }

    fn value(&self) -> f64 {
        self.value
    }
}
