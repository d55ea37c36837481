//! Region annotation of association results.
//!
//! Regions are loaded into one [`IntervalTree`] per chromosome. Each input row
//! is located either by its own chromosome and position columns or through a
//! marker map, and gets one output column per deviation tier listing the
//! regions that lie within that distance (each region in its closest tier).

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::error::{QcError, Result};
use crate::interval_tree::IntervalTree;
use crate::io::{self, AtomicOutput, LineReader};
use crate::schema::{Descriptor, MAP_FILE, REGIONS_FILE};
use crate::types::{
    CHR, CasePolicy, MAP_CHR, MAP_MARKER, MAP_POSITION, MARKER, POSITION, REGION_CHR, REGION_END,
    REGION_NAME, REGION_START, Separator,
};

/// Written for rows without a region or without map coordinates, whatever
/// the input's missing-value marker.
pub const NA: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionColumns {
    pub name: String,
    pub chr: String,
    pub start: String,
    pub end: String,
}

impl Default for RegionColumns {
    fn default() -> Self {
        Self {
            name: REGION_NAME.to_string(),
            chr: REGION_CHR.to_string(),
            start: REGION_START.to_string(),
            end: REGION_END.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapColumns {
    pub marker: String,
    pub chr: String,
    pub position: String,
}

impl Default for MapColumns {
    fn default() -> Self {
        Self {
            marker: MAP_MARKER.to_string(),
            chr: MAP_CHR.to_string(),
            position: MAP_POSITION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub marker: String,
    pub chr: String,
    pub position: String,
    pub deviations: Vec<u64>,
    /// Missing-value marker of the input position column.
    pub na_marker: String,
    pub case: CasePolicy,
    /// Keep every input column instead of only marker, chromosome and position.
    pub append: bool,
    pub map_columns: MapColumns,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            marker: MARKER.to_string(),
            chr: CHR.to_string(),
            position: POSITION.to_string(),
            deviations: vec![0],
            na_marker: NA.to_string(),
            case: CasePolicy::Insensitive,
            append: false,
            map_columns: MapColumns::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub regions: PathBuf,
    pub map: Option<PathBuf>,
    pub separator: Option<Separator>,
    pub regions_separator: Option<Separator>,
    pub map_separator: Option<Separator>,
    pub region_columns: RegionColumns,
    pub options: AnnotateOptions,
}

impl AnnotatorConfig {
    pub fn from_descriptor(descriptor: &Descriptor, output: PathBuf) -> Result<Self> {
        let property = |name: &str| descriptor.property(name).unwrap_or(name).to_string();
        let column = |name: &str| descriptor.column_name(name).unwrap_or(name).to_string();
        let regions = descriptor.property(REGIONS_FILE).ok_or_else(|| {
            QcError::InvalidArgument(format!(
                "No {REGIONS_FILE} set for {}",
                descriptor.file_name()
            ))
        })?;
        Ok(Self {
            input: descriptor.path.clone(),
            output,
            regions: PathBuf::from(regions),
            map: descriptor.property(MAP_FILE).map(PathBuf::from),
            separator: descriptor.data_separator,
            regions_separator: descriptor.regions_separator,
            map_separator: descriptor.map_separator,
            region_columns: RegionColumns {
                name: property(REGION_NAME),
                chr: property(REGION_CHR),
                start: property(REGION_START),
                end: property(REGION_END),
            },
            options: AnnotateOptions {
                marker: column(MARKER),
                chr: column(CHR),
                position: column(POSITION),
                deviations: descriptor.deviations.clone(),
                na_marker: descriptor.na_marker().to_string(),
                case: descriptor.case,
                append: descriptor.regions_append,
                map_columns: MapColumns {
                    marker: property(MAP_MARKER),
                    chr: property(MAP_CHR),
                    position: property(MAP_POSITION),
                },
            },
        })
    }
}

pub fn tier_label(deviation: u64) -> String {
    if deviation == 0 {
        "IN".to_string()
    } else {
        format!("+/-{deviation}")
    }
}

pub(crate) fn find_column(headers: &[&str], name: &str, case: CasePolicy, file: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| case.eq(h.trim(), name))
        .ok_or_else(|| QcError::MissingColumn {
            column: name.to_string(),
            file: file.to_string(),
        })
}

pub(crate) fn parse_coordinate(token: &str, what: &str, file: &str, line: usize) -> Result<u64> {
    token.trim().parse::<u64>().map_err(|_| QcError::Region {
        file: file.to_string(),
        line,
        message: format!("{what} '{token}' is not a non-negative integer"),
    })
}

pub(crate) fn for_each_row<R, F>(reader: R, file: &str, separator: Separator, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&[&str], &[&str], usize) -> Result<()>,
{
    let mut reader = LineReader::new(reader);
    let mut header_line = String::new();
    if !reader.next_line(&mut header_line)? || header_line.trim().is_empty() {
        return Err(QcError::EmptyHeader {
            file: file.to_string(),
        });
    }
    let header: Vec<&str> = io::split_row(&header_line, separator).collect();
    let mut line = String::new();
    while reader.next_line(&mut line)? {
        let line_no = reader.line_number();
        if line.is_empty() {
            return Err(QcError::EmptyLine {
                file: file.to_string(),
                line: line_no,
            });
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
        f(&header, &tokens, line_no)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct RegionIndex {
    case: CasePolicy,
    trees: HashMap<String, IntervalTree<String>>,
}

impl RegionIndex {
    pub fn new(case: CasePolicy) -> Self {
        Self {
            case,
            trees: HashMap::new(),
        }
    }

    pub fn add(&mut self, chr: &str, start: u64, end: u64, name: impl Into<String>) {
        self.trees
            .entry(self.case.key(chr).into_owned())
            .or_default()
            .add(start, end, name.into());
    }

    pub fn tree(&self, chr: &str) -> Option<&IntervalTree<String>> {
        self.trees.get(self.case.key(chr).as_ref())
    }

    pub fn case(&self) -> CasePolicy {
        self.case
    }

    pub fn trees(&self) -> impl Iterator<Item = (&str, &IntervalTree<String>)> {
        self.trees.iter().map(|(chr, tree)| (chr.as_str(), tree))
    }

    pub fn chromosomes(&self) -> usize {
        self.trees.len()
    }

    pub fn len(&self) -> usize {
        self.trees.values().map(IntervalTree::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn load(
        path: &Path,
        separator: Option<Separator>,
        columns: &RegionColumns,
        case: CasePolicy,
    ) -> anyhow::Result<Self> {
        let separator = match separator {
            Some(sep) => sep,
            None => io::detect_separators(path)?.1,
        };
        let reader = io::open_reader(path)?;
        let index = Self::from_reader(reader, &path.display().to_string(), separator, columns, case)
            .with_context(|| format!("load regions from {}", path.display()))?;
        info!(
            regions = index.len(),
            chromosomes = index.chromosomes(),
            "loaded regions from {}",
            path.display()
        );
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        file: &str,
        separator: Separator,
        columns: &RegionColumns,
        case: CasePolicy,
    ) -> Result<Self> {
        let mut index = Self::new(case);
        let mut positions: Option<[usize; 4]> = None;
        for_each_row(reader, file, separator, |header, tokens, line| {
            let [name, chr, start, end] = match positions {
                Some(p) => p,
                None => {
                    let p = [
                        find_column(header, &columns.name, case, file)?,
                        find_column(header, &columns.chr, case, file)?,
                        find_column(header, &columns.start, case, file)?,
                        find_column(header, &columns.end, case, file)?,
                    ];
                    positions = Some(p);
                    p
                }
            };
            let first = parse_coordinate(tokens[start], "start", file, line)?;
            let last = parse_coordinate(tokens[end], "end", file, line)?;
            if first > last {
                return Err(QcError::Region {
                    file: file.to_string(),
                    line,
                    message: format!("start {first} is greater than end {last}"),
                });
            }
            index.add(tokens[chr], first, last, tokens[name]);
            Ok(())
        })?;
        Ok(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub marker: String,
    pub chr: String,
    pub position: u64,
}

/// Marker to chromosome/position lookup. A marker may have several entries.
#[derive(Debug, Default)]
pub struct MarkerMap {
    case: CasePolicy,
    entries: Vec<MapEntry>,
}

impl MarkerMap {
    pub fn new(mut entries: Vec<MapEntry>, case: CasePolicy) -> Self {
        entries.sort_by(|a, b| case.cmp(&a.marker, &b.marker));
        Self { case, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    /// Every entry of `marker`, in map file order.
    pub fn lookup(&self, marker: &str) -> &[MapEntry] {
        let lower = self
            .entries
            .partition_point(|e| self.case.cmp(&e.marker, marker).is_lt());
        let upper = lower
            + self.entries[lower..]
                .partition_point(|e| self.case.cmp(&e.marker, marker).is_eq());
        &self.entries[lower..upper]
    }

    pub fn load(
        path: &Path,
        separator: Option<Separator>,
        columns: &MapColumns,
        case: CasePolicy,
    ) -> anyhow::Result<Self> {
        let separator = match separator {
            Some(sep) => sep,
            None => io::detect_separators(path)?.1,
        };
        let reader = io::open_reader(path)?;
        let map = Self::from_reader(reader, &path.display().to_string(), separator, columns, case)
            .with_context(|| format!("load marker map from {}", path.display()))?;
        info!(entries = map.len(), "loaded marker map from {}", path.display());
        Ok(map)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        file: &str,
        separator: Separator,
        columns: &MapColumns,
        case: CasePolicy,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        let mut positions: Option<[usize; 3]> = None;
        for_each_row(reader, file, separator, |header, tokens, line| {
            let [marker, chr, position] = match positions {
                Some(p) => p,
                None => {
                    let p = [
                        find_column(header, &columns.marker, case, file)?,
                        find_column(header, &columns.chr, case, file)?,
                        find_column(header, &columns.position, case, file)?,
                    ];
                    positions = Some(p);
                    p
                }
            };
            entries.push(MapEntry {
                marker: tokens[marker].to_string(),
                chr: tokens[chr].to_string(),
                position: parse_coordinate(tokens[position], "position", file, line)?,
            });
            Ok(())
        })?;
        Ok(Self::new(entries, case))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub unmapped: usize,
}

struct TierQuery<'a> {
    regions: &'a RegionIndex,
    /// Ascending.
    deviations: Vec<u64>,
    region_separator: String,
    subset: IntervalTree<String>,
    marked: BTreeMap<u64, Vec<String>>,
}

impl<'a> TierQuery<'a> {
    fn new(regions: &'a RegionIndex, deviations: &[u64], separator: Separator) -> Self {
        let mut deviations = deviations.to_vec();
        deviations.sort_unstable();
        deviations.dedup();
        if deviations.is_empty() {
            deviations.push(0);
        }
        Self {
            regions,
            deviations,
            region_separator: separator.region_separator().to_string(),
            subset: IntervalTree::new(),
            marked: BTreeMap::new(),
        }
    }

    fn na(&self, out: &mut Vec<String>) {
        out.extend(self.deviations.iter().map(|_| NA.to_string()));
    }

    fn annotate(&mut self, chr: &str, position: u64, out: &mut Vec<String>) {
        let Some(tree) = self.regions.tree(chr) else {
            self.na(out);
            return;
        };
        let Some((&widest, narrower)) = self.deviations.split_last() else {
            return;
        };
        self.subset.clear();
        self.marked.clear();
        tree.get_intersecting_intervals(position, position, widest, &mut self.subset);
        for &deviation in narrower.iter().rev() {
            self.subset
                .mark_intersecting_intervals(position, position, deviation);
        }
        self.subset.get_marked_values(&mut self.marked);
        for deviation in &self.deviations {
            match self.marked.get(deviation) {
                Some(names) if !names.is_empty() => out.push(names.join(self.region_separator.as_str())),
                _ => out.push(NA.to_string()),
            }
        }
    }
}

/// Region names within one tier are joined with [`Separator::region_separator`].
pub fn annotate_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    file: &str,
    separator: Separator,
    options: &AnnotateOptions,
    regions: &RegionIndex,
    map: Option<&MarkerMap>,
) -> Result<AnnotationSummary> {
    let case = options.case;
    let sep = separator.as_char().to_string();
    let mut query = TierQuery::new(regions, &options.deviations, separator);
    let mut summary = AnnotationSummary::default();

    let mut reader = LineReader::new(reader);
    let mut header_line = String::new();
    if !reader.next_line(&mut header_line)? || header_line.trim().is_empty() {
        return Err(QcError::EmptyHeader {
            file: file.to_string(),
        });
    }
    let header: Vec<&str> = io::split_row(&header_line, separator).collect();
    let marker_idx = find_column(&header, &options.marker, case, file)?;
    let (chr_idx, pos_idx) = if map.is_some() {
        (None, None)
    } else {
        (
            Some(find_column(&header, &options.chr, case, file)?),
            Some(find_column(&header, &options.position, case, file)?),
        )
    };
    let selected: Vec<usize> = if options.append {
        (0..header.len()).collect()
    } else {
        [Some(marker_idx), chr_idx, pos_idx].into_iter().flatten().collect()
    };

    let mut fields: Vec<String> = selected.iter().map(|&i| header[i].to_string()).collect();
    if map.is_some() {
        fields.push(options.map_columns.chr.clone());
        fields.push(options.map_columns.position.clone());
    }
    fields.extend(query.deviations.iter().map(|&d| tier_label(d)));
    writeln!(writer, "{}", fields.join(sep.as_str()))?;

    let mut line = String::new();
    while reader.next_line(&mut line)? {
        let line_no = reader.line_number();
        if line.is_empty() {
            return Err(QcError::EmptyLine {
                file: file.to_string(),
                line: line_no,
            });
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

        fields.clear();
        fields.extend(selected.iter().map(|&i| tokens[i].to_string()));
        let base = fields.len();

        match (map, chr_idx, pos_idx) {
            (Some(map), _, _) => {
                let entries = map.lookup(tokens[marker_idx]);
                if entries.is_empty() {
                    summary.unmapped += 1;
                    fields.push(NA.to_string());
                    fields.push(NA.to_string());
                    query.na(&mut fields);
                    writeln!(writer, "{}", fields.join(sep.as_str()))?;
                    summary.rows_written += 1;
                    continue;
                }
                for entry in entries {
                    fields.truncate(base);
                    fields.push(entry.chr.clone());
                    fields.push(entry.position.to_string());
                    query.annotate(&entry.chr, entry.position, &mut fields);
                    writeln!(writer, "{}", fields.join(sep.as_str()))?;
                    summary.rows_written += 1;
                }
            }
            (None, Some(chr_idx), Some(pos_idx)) => {
                let position = tokens[pos_idx];
                if position == options.na_marker {
                    query.na(&mut fields);
                } else {
                    let position = parse_coordinate(position, "position", file, line_no)?;
                    query.annotate(tokens[chr_idx], position, &mut fields);
                }
                writeln!(writer, "{}", fields.join(sep.as_str()))?;
                summary.rows_written += 1;
            }
            _ => {}
        }
    }
    debug!(?summary, "annotated {file}");
    Ok(summary)
}

pub fn annotate(config: &AnnotatorConfig) -> anyhow::Result<AnnotationSummary> {
    let separator = match config.separator {
        Some(sep) => sep,
        None => io::detect_separators(&config.input)?.1,
    };
    let options = &config.options;
    let regions = RegionIndex::load(
        &config.regions,
        config.regions_separator,
        &config.region_columns,
        options.case,
    )?;
    let map = config
        .map
        .as_deref()
        .map(|path| MarkerMap::load(path, config.map_separator, &options.map_columns, options.case))
        .transpose()?;

    let reader = io::open_reader(&config.input)?;
    let mut output = AtomicOutput::create(&config.output)?;
    let summary = annotate_stream(
        reader,
        &mut output,
        &config.input.display().to_string(),
        separator,
        options,
        &regions,
        map.as_ref(),
    )
    .with_context(|| format!("annotate {}", config.input.display()))?;
    output.commit()?;
    info!(
        rows = summary.rows_read,
        written = summary.rows_written,
        unmapped = summary.unmapped,
        "wrote {}",
        config.output.display()
    );
    Ok(summary)
}
