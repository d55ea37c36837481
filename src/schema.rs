use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{
    ALL_COLUMNS, CasePolicy, DEFAULT_MISSING, DEFAULT_PREFIX, DEFAULT_THRESHOLDS, MANDATORY_COLUMNS,
    MAP_CHR, MAP_MARKER, MAP_POSITION, REGION_CHR, REGION_END, REGION_NAME, REGION_START,
    Separator,
};

pub const MISSING: &str = "MISSING";
pub const VERBOSITY: &str = "VERBOSITY";
pub const CASESENSITIVE: &str = "CASESENSITIVE";
pub const PREFIX: &str = "PREFIX";
pub const REGIONS_FILE: &str = "REGIONS_FILE";
pub const MAP_FILE: &str = "MAP_FILE";
pub const REGIONS_APPEND: &str = "REGIONS_APPEND";

/// Everything known about one input file: column names, thresholds and
/// processing properties.
///
/// Properties are kept as the raw script text; the validators in
/// [`crate::qc`] turn them into the typed fields.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub path: PathBuf,
    pub abbreviation: Option<String>,
    /// Common name to the name expected in the header.
    pub columns: BTreeMap<String, String>,
    pub thresholds: BTreeMap<String, Vec<f64>>,
    pub properties: BTreeMap<String, String>,
    pub header_separator: Option<Separator>,
    pub data_separator: Option<Separator>,
    pub regions_separator: Option<Separator>,
    pub map_separator: Option<Separator>,
    pub deviations: Vec<u64>,
    pub regions_append: bool,
    pub verbosity: u8,
    pub case: CasePolicy,
    pub estimated_rows: Option<usize>,
}

impl Default for Descriptor {
    fn default() -> Self {
        let columns = ALL_COLUMNS
            .iter()
            .map(|c| (c.to_string(), c.to_string()))
            .collect();
        let thresholds = DEFAULT_THRESHOLDS
            .iter()
            .map(|(name, levels)| (name.to_string(), levels.to_vec()))
            .collect();
        let mut properties = BTreeMap::new();
        for (key, value) in [
            (MISSING, DEFAULT_MISSING),
            (VERBOSITY, "1"),
            (CASESENSITIVE, "0"),
            (PREFIX, DEFAULT_PREFIX),
            (REGION_NAME, REGION_NAME),
            (REGION_CHR, REGION_CHR),
            (REGION_START, REGION_START),
            (REGION_END, REGION_END),
            (MAP_MARKER, MAP_MARKER),
            (MAP_CHR, MAP_CHR),
            (MAP_POSITION, MAP_POSITION),
        ] {
            properties.insert(key.to_string(), value.to_string());
        }
        Self {
            path: PathBuf::new(),
            abbreviation: None,
            columns,
            thresholds,
            properties,
            header_separator: None,
            data_separator: None,
            regions_separator: None,
            map_separator: None,
            deviations: vec![0],
            regions_append: false,
            verbosity: 1,
            case: CasePolicy::Insensitive,
            estimated_rows: None,
        }
    }
}

impl Descriptor {
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn file_name(&self) -> String {
        self.path.display().to_string()
    }

    /// Header name configured for a common column name.
    pub fn column_name(&self, common_name: &str) -> Option<&str> {
        self.columns.get(common_name).map(String::as_str)
    }

    pub fn set_column(&mut self, common_name: &str, actual_name: &str) {
        self.columns
            .insert(common_name.to_string(), actual_name.to_string());
    }

    pub fn thresholds(&self, name: &str) -> &[f64] {
        self.thresholds.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(low, high)` of a two-level threshold list.
    pub fn threshold_pair(&self, name: &str) -> Option<(f64, f64)> {
        match self.thresholds(name) {
            [low, high] => Some((*low, *high)),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    pub fn na_marker(&self) -> &str {
        self.property(MISSING).unwrap_or(DEFAULT_MISSING)
    }

    pub fn prefix(&self) -> &str {
        self.property(PREFIX).unwrap_or(DEFAULT_PREFIX)
    }

    /// Short name used in output file names: the abbreviation, else the file
    /// stem without compression suffix.
    pub fn short_name(&self) -> String {
        if let Some(abbreviation) = &self.abbreviation {
            return abbreviation.clone();
        }
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".bz2"))
            .unwrap_or(name);
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_string()
    }

    /// `<prefix><short name>`.
    pub fn output_name(&self) -> String {
        format!("{}{}", self.prefix(), self.short_name())
    }
}

/// Header columns resolved to common names.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub headers: Vec<String>,
    /// Common name of each header column, `None` for columns without a meta.
    pub common: Vec<Option<&'static str>>,
    pub missing: Vec<&'static str>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ColumnMap {
    pub fn index_of(&self, common_name: &str) -> Option<usize> {
        self.common.iter().position(|c| *c == Some(common_name))
    }
}

pub fn resolve_columns(headers: &[String], descriptor: &Descriptor) -> ColumnMap {
    let mut warnings = Vec::new();
    let mut info = Vec::new();
    let mut common: Vec<Option<&'static str>> = vec![None; headers.len()];
    let file = descriptor.file_name();

    for &canonical in ALL_COLUMNS.iter() {
        let Some(actual) = descriptor.column_name(canonical) else {
            continue;
        };
        let mut matches = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| descriptor.case.eq(h.trim(), actual))
            .map(|(i, _)| i);
        let Some(first) = matches.next() else {
            continue;
        };
        if common[first].is_some() {
            warnings.push(format!(
                "Column '{}' in {file} is already mapped; ignoring it for {canonical}.",
                headers[first]
            ));
            continue;
        }
        common[first] = Some(canonical);
        if canonical != actual {
            info.push(format!("Interpreting the {actual} column as the {canonical} column."));
        }
        if matches.next().is_some() {
            warnings.push(format!(
                "Multiple columns in {file} are named '{actual}'; using the first one for {canonical}."
            ));
        }
    }

    let missing: Vec<&'static str> = MANDATORY_COLUMNS
        .iter()
        .copied()
        .filter(|c| !common.contains(&Some(*c)))
        .collect();
    for &column in &missing {
        let actual = descriptor.column_name(column).unwrap_or(column);
        warnings.push(format!("Column '{actual}' ({column}) is missing in {file}."));
    }

    ColumnMap {
        headers: headers.to_vec(),
        common,
        missing,
        warnings,
        info,
    }
}
