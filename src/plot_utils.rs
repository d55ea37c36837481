use anyhow::{Context, Result};
use plotly::common::color::NamedColor;
use plotly::common::{Line, Marker, Mode};
use plotly::layout::Axis;
use plotly::{Bar, Layout, Plot, Scatter};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyzer::FileReport;
use crate::meta::{Accumulate, MetaNumeric};
use crate::plots::{Boxplot, Histogram, QqPlot};
use crate::types::QQ_PLOT_GROUPS;

pub fn ensure_plots_dir(output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create plot directory {}", output_dir.display()))?;
    Ok(output_dir.to_path_buf())
}

pub fn plot_path(dir: &Path, prefix: Option<&str>, name: &str) -> PathBuf {
    let file_name = match prefix {
        Some(pfx) => format!("{pfx}_{name}.html"),
        None => format!("{name}.html"),
    };
    dir.join(file_name)
}

fn color_of(name: Option<&str>) -> NamedColor {
    match name {
        Some("red") => NamedColor::Red,
        Some("blue") => NamedColor::Blue,
        _ => NamedColor::Black,
    }
}

fn title_of(meta: &MetaNumeric) -> String {
    let info = meta.info();
    match &info.description {
        Some(description) => format!("{} ({description})", info.display_name()),
        None => info.display_name().to_string(),
    }
}

pub fn histogram_plot(histogram: &Histogram, title: &str) -> Plot {
    let bar = Bar::new(histogram.mids(), histogram.counts.clone()).name(title);
    let mut plot = Plot::new();
    plot.add_trace(bar);
    let layout = Layout::new()
        .title(format!("{title}, N = {}", histogram.total))
        .x_axis(Axis::new().title(title))
        .y_axis(Axis::new().title("Frequency"));
    plot.set_layout(layout);
    plot
}

/// Box, median and whiskers drawn as line traces.
pub fn boxplot_plot(boxplot: &Boxplot, title: &str) -> Plot {
    let (left, right, mid) = (0.75, 1.25, 1.0);
    let outline = Scatter::new(
        vec![left, right, right, left, left],
        vec![
            boxplot.lower_quartile,
            boxplot.lower_quartile,
            boxplot.upper_quartile,
            boxplot.upper_quartile,
            boxplot.lower_quartile,
        ],
    )
    .mode(Mode::Lines)
    .name("Interquartile range")
    .line(Line::default().color(NamedColor::Black));
    let median = Scatter::new(vec![left, right], vec![boxplot.median, boxplot.median])
        .mode(Mode::Lines)
        .name(format!("Median {:.4}", boxplot.median))
        .line(Line::default().color(NamedColor::Red));
    let lower = Scatter::new(
        vec![mid, mid],
        vec![boxplot.lower_whisker, boxplot.lower_quartile],
    )
    .mode(Mode::Lines)
    .name(format!("{} below", boxplot.outliers_below))
    .line(Line::default().color(NamedColor::DarkGray));
    let upper = Scatter::new(
        vec![mid, mid],
        vec![boxplot.upper_quartile, boxplot.upper_whisker],
    )
    .mode(Mode::Lines)
    .name(format!("{} above", boxplot.outliers_above))
    .line(Line::default().color(NamedColor::DarkGray));

    let mut plot = Plot::new();
    plot.add_trace(outline);
    plot.add_trace(median);
    plot.add_trace(lower);
    plot.add_trace(upper);
    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().range(vec![0.0_f64, 2.0_f64]))
        .y_axis(Axis::new().title(title));
    plot.set_layout(layout);
    plot
}

/// One QQ trace per entry, plus the identity line; every legend shows λ.
pub fn qq_plot(series: Vec<(&QqPlot, String, NamedColor)>, title: &str) -> Plot {
    let mut plot = Plot::new();
    let mut max_expected: f64 = 0.0;
    for (qq, label, color) in series {
        max_expected = qq.expected.iter().copied().fold(max_expected, f64::max);
        let trace = Scatter::new(qq.expected.clone(), qq.observed.clone())
            .mode(Mode::Markers)
            .name(format!("{label}, λ = {:.3}", qq.lambda));
        let trace = trace.marker(Marker::default().color(color));
        plot.add_trace(trace);
    }
    let diagonal = Scatter::new(vec![0.0, max_expected], vec![0.0, max_expected])
        .mode(Mode::Lines)
        .name("Expected")
        .line(Line::default().color(NamedColor::Gray));
    plot.add_trace(diagonal);
    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Expected -log10(p)"))
        .y_axis(Axis::new().title("Observed -log10(p)"));
    plot.set_layout(layout);
    plot
}

/// Write every finalized plot summary of `report` as HTML into `dir`.
pub fn write_plots(report: &FileReport, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let dir = ensure_plots_dir(dir)?;
    let mut written = Vec::new();

    let is_high_quality = |idx: usize| report.high_quality.iter().any(|&(_, i)| i == idx);
    let numeric = report
        .columns
        .iter()
        .filter_map(|(_, meta)| meta.as_numeric())
        .map(|meta| (meta.info().common_name.clone(), meta))
        .chain(report.filtered.iter().enumerate().map(|(idx, f)| {
            let name = &f.info().common_name;
            let name = if is_high_quality(idx) {
                format!("HQ_{name}")
            } else {
                name.clone()
            };
            (name, f.numeric())
        }));
    for (name, meta) in numeric {
        let title = title_of(meta);
        if let Some(histogram) = meta.histogram() {
            let path = plot_path(&dir, Some(prefix), &format!("{name}_histogram"));
            histogram_plot(histogram, &title).write_html(&path);
            written.push(path);
        }
        if let Some(boxplot) = meta.boxplot() {
            let path = plot_path(&dir, Some(prefix), &format!("{name}_boxplot"));
            boxplot_plot(boxplot, &title).write_html(&path);
            written.push(path);
        }
    }

    for (group, members) in QQ_PLOT_GROUPS {
        let series: Vec<(&QqPlot, String, NamedColor)> = members
            .iter()
            .filter_map(|name| report.filtered(name))
            .filter_map(|f| {
                let qq = f.numeric().qqplot()?;
                let label = f
                    .info()
                    .description
                    .clone()
                    .unwrap_or_else(|| f.info().common_name.clone());
                Some((qq, label, color_of(f.color())))
            })
            .collect();
        if series.is_empty() {
            continue;
        }
        let path = plot_path(&dir, Some(prefix), &format!("QQ_{group}"));
        qq_plot(series, &format!("QQ plot, {group} filters")).write_html(&path);
        written.push(path);
    }
    tracing::debug!(plots = written.len(), "plots written to {}", dir.display());
    Ok(written)
}
