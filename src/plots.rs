//! Plot summaries derived from a finalized, sorted sample.

pub const HISTOGRAM_BINS: usize = 1000;
pub const BOXPLOT_COEF: f64 = 1.5;
const QQ_RESOLUTION: f64 = 500.0;

/// Which summaries a numeric accumulator builds on finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotFlags {
    pub histogram: bool,
    pub boxplot: bool,
    pub qqplot: bool,
}

impl Default for PlotFlags {
    fn default() -> Self {
        Self {
            histogram: true,
            boxplot: true,
            qqplot: false,
        }
    }
}

impl PlotFlags {
    pub const NONE: PlotFlags = PlotFlags {
        histogram: false,
        boxplot: false,
        qqplot: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges.
    pub breaks: Vec<f64>,
    pub counts: Vec<usize>,
    /// Finite values counted.
    pub total: usize,
}

impl Histogram {
    pub fn from_sorted(sorted: &[f64], bins: usize) -> Option<Histogram> {
        let finite_start = sorted.iter().position(|x| x.is_finite())?;
        let finite_end = sorted.iter().rposition(|x| x.is_finite())? + 1;
        let finite = &sorted[finite_start..finite_end];
        let lo = finite[0];
        let hi = finite[finite.len() - 1];
        let bins = if hi > lo { bins.max(1) } else { 1 };
        let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
        let breaks: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for x in finite {
            let idx = (((x - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Some(Histogram {
            breaks,
            counts,
            total: finite.len(),
        })
    }

    pub fn mids(&self) -> Vec<f64> {
        self.breaks.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Boxplot {
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers_below: usize,
    pub outliers_above: usize,
}

impl Boxplot {
    /// `quantiles` are min, 25%, median, 75% and max of `sorted`.
    pub fn from_sorted(sorted: &[f64], quantiles: [f64; 5]) -> Option<Boxplot> {
        if sorted.is_empty() {
            return None;
        }
        let [min, q1, median, q3, max] = quantiles;
        let iqr = q3 - q1;
        let low_fence = q1 - BOXPLOT_COEF * iqr;
        let high_fence = q3 + BOXPLOT_COEF * iqr;
        let first_inside = sorted.partition_point(|x| *x < low_fence);
        let past_inside = sorted.partition_point(|x| *x <= high_fence);
        let (lower_whisker, upper_whisker) = if first_inside < past_inside {
            (sorted[first_inside], sorted[past_inside - 1])
        } else {
            (median, median)
        };
        Some(Boxplot {
            min,
            lower_quartile: q1,
            median,
            upper_quartile: q3,
            max,
            lower_whisker,
            upper_whisker,
            outliers_below: first_inside,
            outliers_above: sorted.len() - past_inside,
        })
    }
}

/// Observed against expected `-log10(p)`, thinned to what is visible at plot resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct QqPlot {
    pub expected: Vec<f64>,
    pub observed: Vec<f64>,
    /// Number of p-values before thinning.
    pub points: usize,
    pub lambda: f64,
}

impl QqPlot {
    /// `sorted_p` must be ascending.
    pub fn from_sorted(sorted_p: &[f64], lambda: f64) -> QqPlot {
        let n = sorted_p.len();
        let mut expected = Vec::new();
        let mut observed = Vec::new();
        if n > 0 {
            let x_delta = -(1.0 / n as f64).log10() / QQ_RESOLUTION;
            let y_delta = (-sorted_p[0].log10() + sorted_p[n - 1].log10()) / QQ_RESOLUTION;
            let mut x_prev = f64::INFINITY;
            let mut y_prev = f64::INFINITY;
            for (i, p) in sorted_p.iter().enumerate() {
                let x = -((i + 1) as f64 / n as f64).log10();
                let y = -p.log10();
                if x < x_prev - x_delta || y < y_prev - y_delta {
                    expected.push(x);
                    observed.push(y);
                    x_prev = x;
                    y_prev = y;
                }
            }
        }
        QqPlot {
            expected,
            observed,
            points: n,
            lambda,
        }
    }
}
