//! Nearest-region and region-to-marker queries.
//!
//! [`NearestIndex`] answers "which regions are closest to this position":
//! regions containing the position come first at distance 0, then the
//! closest regions on either side. [`MarkerPositions`] answers the reverse
//! question of which markers fall inside a region.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::iter::Peekable;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info};

use crate::annotator::{
    MapColumns, MarkerMap, RegionColumns, RegionIndex, find_column, parse_coordinate,
};
use crate::error::{QcError, Result};
use crate::io::{self, AtomicOutput, LineReader};
use crate::types::{CHR, CasePolicy, MARKER, POSITION, Separator};

pub const REGION: &str = "REGION";
pub const DISTANCE: &str = "DISTANCE";
pub const START: &str = "START";
pub const END: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestRegion {
    pub name: String,
    pub distance: u64,
}

#[derive(Debug, Clone)]
struct Span {
    start: u64,
    end: u64,
    name: String,
}

#[derive(Debug, Default)]
struct ChromosomeSpans {
    by_start: Vec<Span>,
    by_end: Vec<Span>,
}

#[derive(Debug)]
pub struct NearestIndex<'a> {
    regions: &'a RegionIndex,
    spans: HashMap<String, ChromosomeSpans>,
}

impl<'a> NearestIndex<'a> {
    pub fn new(regions: &'a RegionIndex) -> Self {
        let spans = regions
            .trees()
            .map(|(chr, tree)| {
                let by_start: Vec<Span> = tree
                    .iter()
                    .map(|(start, end, name)| Span {
                        start,
                        end,
                        name: name.clone(),
                    })
                    .collect();
                let mut by_end = by_start.clone();
                by_end.sort_by_key(|span| span.end);
                (chr.to_string(), ChromosomeSpans { by_start, by_end })
            })
            .collect();
        Self { regions, spans }
    }

    /// Every region containing `position`, then up to `k` minus that many
    /// outward steps. A step takes all regions at the next smallest distance
    /// from both sides, so ties are all reported.
    pub fn k_nearest(&self, chr: &str, position: u64, k: usize) -> Vec<NearestRegion> {
        let (Some(tree), Some(spans)) = (
            self.regions.tree(chr),
            self.spans.get(self.regions.case().key(chr).as_ref()),
        ) else {
            return Vec::new();
        };

        let mut nearest: Vec<NearestRegion> = tree
            .intersecting(position, position)
            .into_iter()
            .map(|name| NearestRegion {
                name: name.clone(),
                distance: 0,
            })
            .collect();

        let before = spans.by_end.partition_point(|span| span.end < position);
        let mut left = spans.by_end[..before]
            .iter()
            .rev()
            .map(|span| (position - span.end, span))
            .peekable();
        let after = spans.by_start.partition_point(|span| span.start <= position);
        let mut right = spans.by_start[after..]
            .iter()
            .map(|span| (span.start - position, span))
            .peekable();

        for _ in nearest.len()..k {
            let distance = match (left.peek(), right.peek()) {
                (None, None) => break,
                (Some(&(l, _)), Some(&(r, _))) => l.min(r),
                (Some(&(d, _)), None) | (None, Some(&(d, _))) => d,
            };
            take_at(&mut left, distance, &mut nearest);
            take_at(&mut right, distance, &mut nearest);
        }
        nearest
    }
}

fn take_at<'s, I>(side: &mut Peekable<I>, distance: u64, out: &mut Vec<NearestRegion>)
where
    I: Iterator<Item = (u64, &'s Span)>,
{
    while let Some((_, span)) = side.next_if(|&(d, _)| d == distance) {
        out.push(NearestRegion {
            name: span.name.clone(),
            distance,
        });
    }
}

#[derive(Debug, Default)]
pub struct MarkerPositions {
    case: CasePolicy,
    chromosomes: HashMap<String, BTreeMap<u64, Vec<String>>>,
}

impl MarkerPositions {
    pub fn from_map(map: &MarkerMap, case: CasePolicy) -> Self {
        let mut chromosomes: HashMap<String, BTreeMap<u64, Vec<String>>> = HashMap::new();
        for entry in map.entries() {
            chromosomes
                .entry(case.key(&entry.chr).into_owned())
                .or_default()
                .entry(entry.position)
                .or_default()
                .push(entry.marker.clone());
        }
        Self { case, chromosomes }
    }

    /// `(position, marker)` inside `[start, end]`, by position.
    pub fn within(&self, chr: &str, start: u64, end: u64) -> impl Iterator<Item = (u64, &str)> {
        self.chromosomes
            .get(self.case.key(chr).as_ref())
            .into_iter()
            .flat_map(move |positions| positions.range(start..=end))
            .flat_map(|(&position, markers)| markers.iter().map(move |m| (position, m.as_str())))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone)]
pub struct NearestOptions {
    pub marker: String,
    pub chr: String,
    pub position: String,
    pub k: usize,
    pub na_marker: String,
    pub case: CasePolicy,
    pub append: bool,
}

impl Default for NearestOptions {
    fn default() -> Self {
        Self {
            marker: MARKER.to_string(),
            chr: CHR.to_string(),
            position: POSITION.to_string(),
            k: 1,
            na_marker: "NA".to_string(),
            case: CasePolicy::Insensitive,
            append: false,
        }
    }
}

fn empty_line(file: &str, line: usize) -> QcError {
    QcError::EmptyLine {
        file: file.to_string(),
        line,
    }
}

fn read_header<R: BufRead>(reader: &mut LineReader<R>, buf: &mut String, file: &str) -> Result<()> {
    if !reader.next_line(buf)? || buf.trim().is_empty() {
        return Err(QcError::EmptyHeader {
            file: file.to_string(),
        });
    }
    Ok(())
}

/// One output row per (marker, region) pair. Without `append` the output is
/// tab separated and keeps only marker, chromosome and position.
pub fn nearest_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    file: &str,
    separator: Separator,
    options: &NearestOptions,
    index: &NearestIndex<'_>,
) -> Result<QuerySummary> {
    if options.k == 0 {
        return Err(QcError::InvalidArgument(
            "number of nearest regions must be positive".to_string(),
        ));
    }
    let mut reader = LineReader::new(reader);
    let mut header_line = String::new();
    read_header(&mut reader, &mut header_line, file)?;
    let header: Vec<&str> = io::split_row(&header_line, separator).collect();
    let marker = find_column(&header, &options.marker, options.case, file)?;
    let chr = find_column(&header, &options.chr, options.case, file)?;
    let position = find_column(&header, &options.position, options.case, file)?;

    let output_separator = if options.append { separator } else { Separator::Tab };
    let sep = output_separator.as_char().to_string();
    let sep = sep.as_str();
    let mut prefix: Vec<&str> = if options.append {
        header.clone()
    } else {
        vec![MARKER, CHR, POSITION]
    };
    prefix.extend([REGION, DISTANCE]);
    writeln!(writer, "{}", prefix.join(sep))?;

    let mut summary = QuerySummary::default();
    let mut line = String::new();
    while reader.next_line(&mut line)? {
        let line_no = reader.line_number();
        if line.is_empty() {
            return Err(empty_line(file, line_no));
        }
        let tokens: Vec<&str> = io::split_row(&line, separator).collect();
        if tokens.len() != header.len() {
            return Err(QcError::MalformedRow {
                file: file.to_string(),
                line: line_no,
                expected: header.len(),
                actual: tokens.len(),
            });
        }
        summary.rows_read += 1;

        let nearest = if tokens[position] == options.na_marker {
            Vec::new()
        } else {
            let at = parse_coordinate(tokens[position], "position", file, line_no)?;
            index.k_nearest(tokens[chr], at, options.k)
        };
        if nearest.is_empty() {
            summary.unmatched += 1;
            continue;
        }
        let kept = if options.append {
            line.clone()
        } else {
            [tokens[marker], tokens[chr], tokens[position]].join(sep)
        };
        for region in nearest {
            writeln!(writer, "{kept}{sep}{}{sep}{}", region.name, region.distance)?;
            summary.rows_written += 1;
        }
    }
    debug!(?summary, "nearest regions of {file}");
    Ok(summary)
}

#[derive(Debug, Clone, Default)]
pub struct RegionMarkersOptions {
    pub columns: RegionColumns,
    pub case: CasePolicy,
    pub append: bool,
}

/// Markers in position order; tab separated unless `append`.
pub fn region_markers_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    file: &str,
    separator: Separator,
    options: &RegionMarkersOptions,
    markers: &MarkerPositions,
) -> Result<QuerySummary> {
    let (columns, case) = (&options.columns, options.case);
    let mut reader = LineReader::new(reader);
    let mut header_line = String::new();
    read_header(&mut reader, &mut header_line, file)?;
    let header: Vec<&str> = io::split_row(&header_line, separator).collect();
    let name = find_column(&header, &columns.name, case, file)?;
    let chr = find_column(&header, &columns.chr, case, file)?;
    let start = find_column(&header, &columns.start, case, file)?;
    let end = find_column(&header, &columns.end, case, file)?;

    let output_separator = if options.append { separator } else { Separator::Tab };
    let sep = output_separator.as_char().to_string();
    let sep = sep.as_str();
    let mut fields: Vec<&str> = if options.append {
        header.clone()
    } else {
        vec![REGION, CHR, START, END]
    };
    fields.extend([MARKER, POSITION]);
    writeln!(writer, "{}", fields.join(sep))?;

    let mut summary = QuerySummary::default();
    let mut line = String::new();
    while reader.next_line(&mut line)? {
        let line_no = reader.line_number();
        if line.is_empty() {
            return Err(empty_line(file, line_no));
        }
        let tokens: Vec<&str> = io::split_row(&line, separator).collect();
        if tokens.len() != header.len() {
            return Err(QcError::MalformedRow {
                file: file.to_string(),
                line: line_no,
                expected: header.len(),
                actual: tokens.len(),
            });
        }
        summary.rows_read += 1;

        let first = parse_coordinate(tokens[start], "start", file, line_no)?;
        let last = parse_coordinate(tokens[end], "end", file, line_no)?;
        if first > last {
            return Err(QcError::Region {
                file: file.to_string(),
                line: line_no,
                message: format!("start {first} is greater than end {last}"),
            });
        }
        let kept = if options.append {
            line.clone()
        } else {
            [tokens[name], tokens[chr], tokens[start], tokens[end]].join(sep)
        };
        let before = summary.rows_written;
        for (position, marker) in markers.within(tokens[chr], first, last) {
            writeln!(writer, "{kept}{sep}{marker}{sep}{position}")?;
            summary.rows_written += 1;
        }
        if summary.rows_written == before {
            summary.unmatched += 1;
        }
    }
    debug!(?summary, "markers within regions of {file}");
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct NearestConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub regions: PathBuf,
    pub separator: Option<Separator>,
    pub regions_separator: Option<Separator>,
    pub region_columns: RegionColumns,
    pub options: NearestOptions,
}

pub fn nearest_regions(config: &NearestConfig) -> anyhow::Result<QuerySummary> {
    let separator = match config.separator {
        Some(sep) => sep,
        None => io::detect_separators(&config.input)?.1,
    };
    let regions = RegionIndex::load(
        &config.regions,
        config.regions_separator,
        &config.region_columns,
        config.options.case,
    )?;
    let index = NearestIndex::new(&regions);

    let reader = io::open_reader(&config.input)?;
    let mut output = AtomicOutput::create(&config.output)?;
    let summary = nearest_stream(
        reader,
        &mut output,
        &config.input.display().to_string(),
        separator,
        &config.options,
        &index,
    )
    .with_context(|| format!("find nearest regions for {}", config.input.display()))?;
    output.commit()?;
    info!(
        rows = summary.rows_read,
        written = summary.rows_written,
        unmatched = summary.unmatched,
        k = config.options.k,
        "wrote {}",
        config.output.display()
    );
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct RegionMarkersConfig {
    pub regions: PathBuf,
    pub markers: PathBuf,
    pub output: PathBuf,
    pub regions_separator: Option<Separator>,
    pub markers_separator: Option<Separator>,
    pub marker_columns: MapColumns,
    pub options: RegionMarkersOptions,
}

pub fn region_markers(config: &RegionMarkersConfig) -> anyhow::Result<QuerySummary> {
    let case = config.options.case;
    let map = MarkerMap::load(&config.markers, config.markers_separator, &config.marker_columns, case)?;
    let markers = MarkerPositions::from_map(&map, case);
    let separator = match config.regions_separator {
        Some(sep) => sep,
        None => io::detect_separators(&config.regions)?.1,
    };

    let reader = io::open_reader(&config.regions)?;
    let mut output = AtomicOutput::create(&config.output)?;
    let summary = region_markers_stream(
        reader,
        &mut output,
        &config.regions.display().to_string(),
        separator,
        &config.options,
        &markers,
    )
    .with_context(|| format!("list markers within {}", config.regions.display()))?;
    output.commit()?;
    info!(
        regions = summary.rows_read,
        written = summary.rows_written,
        "wrote {}",
        config.output.display()
    );
    Ok(summary)
}
