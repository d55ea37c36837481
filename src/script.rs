//! Descriptor scripts.
//!
//! A script is a list of keyword commands, one per line. Commands update a
//! running default descriptor; `PROCESS <file> [<abbreviation>]` takes a copy
//! of it for that file. Everything after a token starting with `#` is a
//! comment.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::{QcError, Result};
use crate::schema::{
    CASESENSITIVE, Descriptor, MAP_FILE, MISSING, PREFIX, REGIONS_APPEND, REGIONS_FILE, VERBOSITY,
};
use crate::types::{
    ALLELE1, ALLELE2, CHR, EFFECT, FILTER_LEVELS, IMPUTED, MAP_CHR, MAP_MARKER, MAP_POSITION,
    MARKER, N_TOTAL, POSITION, REGION_CHR, REGION_END, REGION_NAME, REGION_START, STRAND,
    Separator, THRESHOLD_COLUMNS, USED_FOR_IMP,
};

const PROCESS: &str = "PROCESS";
const ALLELE: &str = "ALLELE";
const SEPARATOR: &str = "SEPARATOR";
const REGIONS_FILE_SEPARATOR: &str = "REGIONS_FILE_SEPARATOR";
const MAP_FILE_SEPARATOR: &str = "MAP_FILE_SEPARATOR";
const REGIONS_DEVIATION: &str = "REGIONS_DEVIATION";
const COMMENT: char = '#';

const NAME_COLUMNS: [&str; 8] = [MARKER, CHR, POSITION, STRAND, EFFECT, N_TOTAL, IMPUTED, USED_FOR_IMP];
const TEXT_PROPERTIES: [&str; 12] = [
    MISSING,
    VERBOSITY,
    PREFIX,
    REGIONS_FILE,
    REGION_NAME,
    REGION_CHR,
    REGION_START,
    REGION_END,
    MAP_FILE,
    MAP_MARKER,
    MAP_CHR,
    MAP_POSITION,
];

pub fn read_script(path: &Path) -> anyhow::Result<Vec<Descriptor>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_script(&text).with_context(|| format!("parse script {}", path.display()))
}

pub fn parse_script(text: &str) -> Result<Vec<Descriptor>> {
    let mut current = Descriptor::default();
    let mut descriptors = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let tokens: Vec<&str> = line
            .split_whitespace()
            .take_while(|t| !t.starts_with(COMMENT))
            .collect();
        let Some((&command, args)) = tokens.split_first() else {
            continue;
        };
        if args.is_empty() {
            continue;
        }

        match command {
            PROCESS => {
                let mut descriptor = current.clone();
                descriptor.path = args[0].into();
                descriptor.abbreviation = args.get(1).map(|s| s.to_string());
                descriptors.push(descriptor);
            }
            ALLELE => {
                current.set_column(ALLELE1, args[0]);
                if let Some(second) = args.get(1) {
                    current.set_column(ALLELE2, second);
                }
            }
            c if NAME_COLUMNS.contains(&c) => current.set_column(c, args[0]),
            c if THRESHOLD_COLUMNS.contains(&c) => {
                current.set_column(c, args[0]);
                if args.len() > 1 {
                    let levels = parse_numbers(&args[1..], c, line_no)?;
                    current.thresholds.insert(c.to_string(), levels);
                }
            }
            c if FILTER_LEVELS.contains(&c) => {
                let levels = parse_numbers(args, c, line_no)?;
                current.thresholds.insert(c.to_string(), levels);
            }
            c if TEXT_PROPERTIES.contains(&c) => current.set_property(c, args[0]),
            CASESENSITIVE => {
                let flag = parse_mode(args[0], command, line_no)?;
                current.set_property(CASESENSITIVE, if flag { "1" } else { "0" });
            }
            SEPARATOR => {
                let separator = parse_separator(args[0], command, line_no)?;
                current.header_separator = Some(separator);
                current.data_separator = Some(separator);
            }
            REGIONS_FILE_SEPARATOR => {
                current.regions_separator = Some(parse_separator(args[0], command, line_no)?);
            }
            MAP_FILE_SEPARATOR => {
                current.map_separator = Some(parse_separator(args[0], command, line_no)?);
            }
            REGIONS_DEVIATION => {
                current.deviations = args
                    .iter()
                    .map(|token| {
                        token.parse::<u64>().map_err(|_| QcError::Script {
                            line: line_no,
                            message: format!("'{token}' is not a valid deviation for {command}"),
                        })
                    })
                    .collect::<Result<_>>()?;
            }
            REGIONS_APPEND => current.regions_append = parse_mode(args[0], command, line_no)?,
            other => debug!(line = line_no, command = other, "ignoring unknown script command"),
        }
    }

    Ok(descriptors)
}

fn parse_numbers(tokens: &[&str], command: &str, line: usize) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| QcError::Script {
                    line,
                    message: format!("'{token}' is not a numeric threshold for {command}"),
                })
        })
        .collect()
}

fn parse_separator(token: &str, command: &str, line: usize) -> Result<Separator> {
    Separator::from_name(token).ok_or_else(|| QcError::Script {
        line,
        message: format!("unknown separator '{token}' for {command}"),
    })
}

fn parse_mode(token: &str, command: &str, line: usize) -> Result<bool> {
    if token.eq_ignore_ascii_case("ON") || token == "1" {
        Ok(true)
    } else if token.eq_ignore_ascii_case("OFF") || token == "0" {
        Ok(false)
    } else {
        Err(QcError::Script {
            line,
            message: format!("unknown mode '{token}' for {command}"),
        })
    }
}
