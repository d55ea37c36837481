//! Plain-text QC report of one finalized file.

use std::io::{self, Write};

use crate::analyzer::FileReport;
use crate::meta::numeric::NumericSummary;
use crate::meta::{
    Accumulate, ColumnMeta, MetaCrossTable, MetaFiltered, MetaNumeric, MetaRatio, RowValue,
};

pub fn non_numeric_message(actual_name: &str) -> String {
    format!("'{actual_name}' : non-numeric values are present or all values are missing")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{value:.6}")
    }
}

fn write_summary<W: Write>(w: &mut W, meta: &MetaNumeric, summary: &NumericSummary) -> io::Result<()> {
    let output = meta.output();
    if let Some(range) = meta.range() {
        writeln!(w, "  Values below {}: {}", range.less, meta.n_less())?;
        writeln!(w, "  Values above {}: {}", range.greater, meta.n_greater())?;
    }
    writeln!(w, "  N: {}", summary.n)?;
    writeln!(w, "  NA: {}", meta.na_count())?;
    writeln!(w, "  Mean: {}", format_value(summary.mean))?;
    writeln!(w, "  SD: {}", format_value(summary.sd))?;
    if output.min {
        writeln!(w, "  Min: {}", format_value(summary.min))?;
    }
    if output.max {
        writeln!(w, "  Max: {}", format_value(summary.max))?;
    }
    if output.median {
        writeln!(w, "  Median: {}", format_value(summary.median))?;
    }
    if output.skewness {
        writeln!(w, "  Skewness: {}", format_value(summary.skewness))?;
    }
    if output.kurtosis {
        writeln!(w, "  Kurtosis: {}", format_value(summary.kurtosis))?;
    }
    if output.quantiles {
        for (level, value) in summary.quantiles {
            writeln!(w, "  Quantile {:>5.2}: {}", level, format_value(value))?;
        }
    }
    Ok(())
}

fn write_numeric<W: Write>(w: &mut W, meta: &MetaNumeric) -> io::Result<()> {
    let info = meta.info();
    match meta.summary() {
        Some(summary) if meta.is_numeric() => {
            match &info.description {
                Some(description) => writeln!(w, "{} ({description})", info.display_name())?,
                None => writeln!(w, "{}", info.display_name())?,
            }
            write_summary(w, meta, summary)?;
            if let Some(lambda) = meta.lambda() {
                writeln!(w, "  Lambda: {}", format_value(lambda))?;
            }
        }
        _ => writeln!(w, "{}", non_numeric_message(&info.actual_name))?,
    }
    Ok(())
}

fn write_column<W: Write>(w: &mut W, meta: &ColumnMeta) -> io::Result<()> {
    match meta {
        ColumnMeta::Numeric(numeric) => write_numeric(w, numeric)?,
        ColumnMeta::Group(group) => {
            writeln!(w, "{}", group.info().display_name())?;
            writeln!(w, "  N: {}", group.n())?;
            writeln!(w, "  NA: {}", group.na_count())?;
            for (value, count) in group.groups() {
                writeln!(w, "  {value}: {count}")?;
            }
        }
        ColumnMeta::Uniqueness(unique) => {
            writeln!(w, "{}", unique.info().display_name())?;
            writeln!(w, "  N: {}", unique.n())?;
            writeln!(w, "  NA: {}", unique.na_count())?;
            writeln!(w, "  Duplicates: {}", unique.duplicates().len())?;
            for value in unique.duplicates() {
                writeln!(w, "    {value}")?;
            }
        }
        ColumnMeta::Format(format) => {
            let info = format.info();
            if meta.is_numeric() {
                writeln!(w, "{}", info.display_name())?;
                writeln!(w, "  N: {}", format.n())?;
                writeln!(w, "  NA: {}", format.na_count())?;
            } else {
                writeln!(w, "{}", non_numeric_message(&info.actual_name))?;
            }
        }
    }
    Ok(())
}

fn write_filtered<W: Write>(
    w: &mut W,
    meta: &MetaFiltered,
    report: &FileReport,
) -> io::Result<()> {
    let name = |id| {
        report
            .columns
            .get(id)
            .map_or("?", |m: &ColumnMeta| m.info().actual_name.as_str())
    };
    let info = meta.info();
    writeln!(w, "[{}] source: {}", info.common_name, name(meta.source()))?;
    for condition in meta.conditions() {
        writeln!(w, "  where {} {}", name(condition.meta), condition.predicate)?;
    }
    for &id in meta.presence() {
        writeln!(w, "  where {} present", name(id))?;
    }
    write_numeric(w, meta.numeric())
}

fn write_ratio<W: Write>(w: &mut W, ratio: &MetaRatio) -> io::Result<()> {
    writeln!(w, "[{}]", ratio.info().common_name)?;
    if !ratio.is_numeric() {
        writeln!(w, "{}", non_numeric_message(&ratio.info().actual_name))?;
        return Ok(());
    }
    writeln!(w, "  Fraction\tN\tSkewness\tKurtosis")?;
    for slice in ratio.slices() {
        writeln!(
            w,
            "  {}\t{}\t{}\t{}",
            slice.fraction,
            slice.n,
            format_value(slice.skewness),
            format_value(slice.kurtosis)
        )?;
    }
    Ok(())
}

fn write_cross_table<W: Write>(w: &mut W, table: &MetaCrossTable) -> io::Result<()> {
    writeln!(w, "[{}]", table.title())?;
    if !table.is_numeric() {
        writeln!(w, "{}", non_numeric_message(&table.info().actual_name))?;
        return Ok(());
    }
    let ys: Vec<f64> = table.y_values().collect();
    let header: Vec<String> = ys.iter().map(f64::to_string).collect();
    writeln!(w, "  \t{}\tNA\tTotal", header.join("\t"))?;
    let x_na: Vec<(f64, usize)> = table.x_na_by_y().collect();
    let y_na: Vec<(f64, usize)> = table.y_na_by_x().collect();
    let na_of = |pairs: &[(f64, usize)], key: f64| {
        pairs
            .iter()
            .find(|(k, _)| k.total_cmp(&key).is_eq())
            .map_or(0, |(_, n)| *n)
    };
    for x in table.x_values() {
        let cells: Vec<String> = ys.iter().map(|&y| table.count(x, y).to_string()).collect();
        writeln!(
            w,
            "  {x}\t{}\t{}\t{}",
            cells.join("\t"),
            na_of(&y_na, x),
            table.x_total(x)
        )?;
    }
    let na_row: Vec<String> = ys.iter().map(|&y| na_of(&x_na, y).to_string()).collect();
    writeln!(w, "  NA\t{}\t{}\t", na_row.join("\t"), table.both_na())?;
    let totals: Vec<String> = ys.iter().map(|&y| table.y_total(y).to_string()).collect();
    writeln!(w, "  Total\t{}\t\t{}", totals.join("\t"), table.total())?;
    Ok(())
}

pub fn write_report<W: Write>(w: &mut W, report: &FileReport) -> io::Result<()> {
    writeln!(w, "File: {}", report.descriptor.path.display())?;
    writeln!(w, "Rows: {}", report.rows)?;
    writeln!(w, "Memory used: {} bytes", report.memory_usage)?;
    if !report.column_map.missing.is_empty() {
        writeln!(w, "Missing columns: {}", report.column_map.missing.join(", "))?;
    }
    writeln!(w)?;

    for (_, meta) in report.columns.iter() {
        write_column(w, meta)?;
        writeln!(w)?;
    }

    for meta in &report.filtered {
        write_filtered(w, meta, report)?;
        writeln!(w)?;
    }

    if let Some(ratio) = &report.ratio {
        write_ratio(w, ratio)?;
        writeln!(w)?;
    }
    if let Some(table) = &report.cross_table {
        write_cross_table(w, table)?;
        writeln!(w)?;
    }

    if !report.dependencies.is_empty() {
        writeln!(w, "Dependencies (present / missing: rows)")?;
        for dependency in &report.dependencies {
            match dependency.count {
                Some(count) => writeln!(
                    w,
                    "  {} / {}: {count}",
                    dependency.present, dependency.missing
                )?,
                None => writeln!(
                    w,
                    "  {} / {}: unavailable",
                    dependency.present, dependency.missing
                )?,
            }
        }
    }
    Ok(())
}
