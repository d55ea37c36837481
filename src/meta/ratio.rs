use std::mem::size_of;

use crate::error::{QcError, Result};
use crate::meta::{MetaInfo, MetaRef, RowView};
use crate::stats;
use crate::types::RATIO_SLICES;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioSlice {
    pub fraction: f64,
    pub n: usize,
    pub skewness: f64,
    pub kurtosis: f64,
}

// Rows are ordered by decreasing chi-square p of (a / b)^2 at finalize.
#[derive(Debug)]
pub struct MetaRatio {
    info: MetaInfo,
    numerator: MetaRef,
    denominator: MetaRef,
    rows: Vec<(f64, f64)>,
    numeric: bool,
    n: usize,
    slices: Vec<RatioSlice>,
    finalized: bool,
}

impl MetaRatio {
    pub fn new(info: MetaInfo, numerator: MetaRef, denominator: MetaRef, capacity: usize) -> Result<Self> {
        let mut rows = Vec::new();
        rows.try_reserve_exact(capacity)
            .map_err(|_| QcError::allocation(&info.common_name, capacity, size_of::<(f64, f64)>()))?;
        Ok(Self {
            info,
            numerator,
            denominator,
            rows,
            numeric: true,
            n: 0,
            slices: Vec::new(),
            finalized: false,
        })
    }

    pub fn info(&self) -> &MetaInfo {
        &self.info
    }

    pub fn numerator(&self) -> MetaRef {
        self.numerator
    }

    pub fn denominator(&self) -> MetaRef {
        self.denominator
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn slices(&self) -> &[RatioSlice] {
        &self.slices
    }

    pub fn memory_usage(&self) -> usize {
        self.rows.capacity() * size_of::<(f64, f64)>()
    }

    pub fn put_row(&mut self, row: &RowView<'_>) -> Result<()> {
        if !self.numeric {
            return Ok(());
        }
        let (Some(a), Some(b)) = (row.get(self.numerator), row.get(self.denominator)) else {
            return Ok(());
        };
        if !a.is_numeric() || !b.is_numeric() || a.is_na() || b.is_na() {
            return Ok(());
        }
        let ratio = a.value() / b.value();
        if ratio.is_nan() {
            return Ok(());
        }
        let p = stats::chi_square_upper_tail(ratio * ratio);

        if self.rows.len() == self.rows.capacity() {
            let requested = self.rows.capacity() + super::HEAP_INCREMENT;
            self.rows
                .try_reserve_exact(super::HEAP_INCREMENT)
                .map_err(|_| QcError::allocation(&self.info.common_name, requested, size_of::<(f64, f64)>()))?;
        }
        self.rows.push((p, a.value()));
        self.n += 1;
        Ok(())
    }

    /// Sort by decreasing p and compute the slice moments. Sources that ended
    /// non-numeric, or no stored row, leave the ratio non-numeric.
    pub fn finalize(&mut self, row: &RowView<'_>) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let sources_numeric = [self.numerator, self.denominator]
            .into_iter()
            .all(|meta| row.get(meta).is_some_and(|m| m.is_numeric()));
        if !sources_numeric || self.n == 0 {
            self.numeric = false;
            self.rows = Vec::new();
            return;
        }

        let mut rows = std::mem::take(&mut self.rows);
        rows.sort_by(|x, y| y.0.total_cmp(&x.0));
        let values: Vec<f64> = rows.into_iter().map(|(_, a)| a).collect();

        self.slices = RATIO_SLICES
            .iter()
            .map(|&fraction| {
                let n = (values.len() as f64 * fraction).floor() as usize;
                let moments = stats::moments(&values[..n]);
                RatioSlice {
                    fraction,
                    n,
                    skewness: moments.skewness,
                    kurtosis: moments.kurtosis,
                }
            })
            .collect();
    }
}
