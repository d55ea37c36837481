//! Rewrites an input file with genomic-control adjusted columns appended.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::error::{QcError, Result};
use crate::io::{self, AtomicOutput, LineReader};
use crate::meta::numeric::{ParsedToken, parse_token};
use crate::qc::check_range_f64;
use crate::stats::{chi_square_upper_quantile, chi_square_upper_tail};
use crate::types::{CasePolicy, IMP_QUALITY, N_TOTAL, PVALUE, STDERR, Separator};

pub const PVALUE_GC: &str = "PVALUE_GC";
pub const STDERR_GC: &str = "STDERR_GC";
pub const N_EFF: &str = "N_EFF";

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub pvalue: String,
    pub stderr: String,
    pub n_total: String,
    pub imp_quality: String,
    /// Genomic inflation factor used for the adjustment.
    pub lambda: f64,
    pub na_marker: String,
    pub case: CasePolicy,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            pvalue: PVALUE.to_string(),
            stderr: STDERR.to_string(),
            n_total: N_TOTAL.to_string(),
            imp_quality: IMP_QUALITY.to_string(),
            lambda: 1.0,
            na_marker: "NA".to_string(),
            case: CasePolicy::Insensitive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatterConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub separator: Option<Separator>,
    pub options: FormatOptions,
}

/// P-value corrected for inflation `lambda`; unchanged when `lambda <= 1`.
pub fn adjust_pvalue(p: f64, lambda: f64) -> f64 {
    if lambda > 1.0 {
        chi_square_upper_tail(chi_square_upper_quantile(p) / lambda)
    } else {
        p
    }
}

/// Standard error inflated by `sqrt(lambda)`; unchanged when `lambda <= 1`.
pub fn adjust_stderr(se: f64, lambda: f64) -> f64 {
    if lambda > 1.0 { se * lambda.sqrt() } else { se }
}

fn value_of(token: &str, na_marker: &str) -> Option<f64> {
    if token == na_marker {
        return None;
    }
    match parse_token(token) {
        ParsedToken::Value(v) => Some(v),
        ParsedToken::Missing | ParsedToken::Invalid => None,
    }
}

fn render(value: Option<f64>, na_marker: &str) -> String {
    match value {
        Some(v) if !v.is_nan() => v.to_string(),
        _ => na_marker.to_string(),
    }
}

pub fn format_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    file: &str,
    separator: Separator,
    options: &FormatOptions,
) -> Result<usize> {
    check_range_f64(options.lambda, 0.0, f64::INFINITY, true, "lambda")?;
    let mut reader = LineReader::new(reader);
    let mut header_line = String::new();
    if !reader.next_line(&mut header_line)? || header_line.trim().is_empty() {
        return Err(QcError::EmptyHeader {
            file: file.to_string(),
        });
    }
    let header: Vec<&str> = io::split_row(&header_line, separator).collect();
    let find = |name: &str| header.iter().position(|h| options.case.eq(h.trim(), name));
    let pvalue = find(&options.pvalue);
    let stderr = find(&options.stderr);
    let n_eff = find(&options.n_total).zip(find(&options.imp_quality));

    let sep = separator.as_char();
    let mut out = header_line.clone();
    for (present, name) in [
        (pvalue.is_some(), PVALUE_GC),
        (stderr.is_some(), STDERR_GC),
        (n_eff.is_some(), N_EFF),
    ] {
        if present {
            out.push(sep);
            out.push_str(name);
        }
    }
    writeln!(writer, "{out}")?;

    let na = options.na_marker.as_str();
    let mut rows = 0;
    let mut line = String::new();
    while reader.next_line(&mut line)? {
        if line.is_empty() {
            return Err(QcError::EmptyLine {
                file: file.to_string(),
                line: reader.line_number(),
            });
        }
        let tokens: Vec<&str> = io::split_row(&line, separator).collect();
        if tokens.len() != header.len() {
            return Err(QcError::MalformedRow {
                file: file.to_string(),
                line: reader.line_number(),
                expected: header.len(),
                actual: tokens.len(),
            });
        }
        out.clear();
        out.push_str(&line);
        if let Some(i) = pvalue {
            let p = value_of(tokens[i], na).map(|p| adjust_pvalue(p, options.lambda));
            out.push(sep);
            out.push_str(&render(p, na));
        }
        if let Some(i) = stderr {
            let se = value_of(tokens[i], na).map(|se| adjust_stderr(se, options.lambda));
            out.push(sep);
            out.push_str(&render(se, na));
        }
        if let Some((n_idx, q_idx)) = n_eff {
            let n = value_of(tokens[n_idx], na).zip(value_of(tokens[q_idx], na));
            out.push(sep);
            out.push_str(&render(n.map(|(n, q)| n * q), na));
        }
        writeln!(writer, "{out}")?;
        rows += 1;
    }
    Ok(rows)
}

/// Format `config.input` into `config.output`, atomically.
pub fn format_file(config: &FormatterConfig) -> anyhow::Result<usize> {
    let separator = match config.separator {
        Some(sep) => sep,
        None => io::detect_separators(&config.input)?.1,
    };
    let reader = io::open_reader(&config.input)?;
    let mut output = AtomicOutput::create(&config.output)?;
    let rows = format_stream(
        reader,
        &mut output,
        &config.input.display().to_string(),
        separator,
        &config.options,
    )
    .with_context(|| format!("format {}", config.input.display()))?;
    output.commit()?;
    info!(rows, lambda = config.options.lambda, "wrote {}", config.output.display());
    Ok(rows)
}
