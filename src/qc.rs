use std::path::Path;

use crate::error::{QcError, Result};
use crate::schema::{CASESENSITIVE, Descriptor, VERBOSITY};
use crate::types::{CasePolicy, FILTER_LEVELS, THRESHOLD_COLUMNS};

/// One descriptor check; may normalise the descriptor in place.
pub type Validator = fn(&mut Descriptor) -> Result<()>;

/// Checks applied to every descriptor, in order. The first failure stops.
pub const VALIDATORS: [(&str, Validator); 7] = [
    ("separators", check_separators),
    ("missing value", check_missing_value),
    ("verbosity", check_verbosity_level),
    ("filters", check_filters),
    ("thresholds", check_thresholds),
    ("case sensitivity", check_case_sensitivity),
    ("output prefix", check_output_prefix),
];

pub fn validate_descriptor(descriptor: &mut Descriptor) -> Result<()> {
    for (name, validator) in VALIDATORS {
        validator(descriptor).inspect_err(|err| {
            tracing::debug!(check = name, file = %descriptor.path.display(), "validation failed: {err}");
        })?;
    }
    Ok(())
}

pub fn check_separators(descriptor: &mut Descriptor) -> Result<()> {
    if descriptor.header_separator.is_none() || descriptor.data_separator.is_none() {
        return Err(QcError::InvalidArgument(format!(
            "Field separators of {} are not resolved",
            descriptor.file_name()
        )));
    }
    Ok(())
}

pub fn check_missing_value(descriptor: &mut Descriptor) -> Result<()> {
    let marker = descriptor.na_marker();
    if marker.is_empty() {
        return Err(QcError::InvalidArgument(format!(
            "Missing value marker of {} should not be empty",
            descriptor.file_name()
        )));
    }
    if let Some(separator) = descriptor.data_separator
        && marker.contains(separator.as_char())
    {
        return Err(QcError::MissingValueSeparator {
            marker: marker.to_string(),
            separator: separator.as_char(),
        });
    }
    Ok(())
}

pub fn check_verbosity_level(descriptor: &mut Descriptor) -> Result<()> {
    let value = descriptor.property(VERBOSITY).unwrap_or("1");
    match value.parse::<u8>() {
        Ok(level @ (1 | 2)) => {
            descriptor.verbosity = level;
            Ok(())
        }
        _ => Err(QcError::InvalidArgument(format!(
            "Verbosity level of {} should be 1 or 2, found '{value}'",
            descriptor.file_name()
        ))),
    }
}

/// Filter levels (MAF, IMP, HQ_SNP) need exactly two values, stored ascending.
pub fn check_filters(descriptor: &mut Descriptor) -> Result<()> {
    check_two_levels(descriptor, &FILTER_LEVELS)
}

/// Threshold columns need exactly two bounds, stored ascending.
pub fn check_thresholds(descriptor: &mut Descriptor) -> Result<()> {
    check_two_levels(descriptor, &THRESHOLD_COLUMNS)
}

fn check_two_levels(descriptor: &mut Descriptor, names: &[&str]) -> Result<()> {
    let file = descriptor.file_name();
    for name in names {
        let Some(levels) = descriptor.thresholds.get_mut(*name) else {
            return Err(QcError::InvalidArgument(format!(
                "Thresholds for {name} are missing in the descriptor of {file}"
            )));
        };
        check_equal_length(levels.len(), 2, name, "the two threshold levels")?;
        if levels[0] > levels[1] {
            levels.swap(0, 1);
        }
    }
    Ok(())
}

pub fn check_case_sensitivity(descriptor: &mut Descriptor) -> Result<()> {
    descriptor.case = match descriptor.property(CASESENSITIVE) {
        None | Some("0") => CasePolicy::Insensitive,
        Some("1") => CasePolicy::Sensitive,
        Some(other) => {
            return Err(QcError::InvalidArgument(format!(
                "Case sensitivity of {} should be 0 or 1, found '{other}'",
                descriptor.file_name()
            )));
        }
    };
    Ok(())
}

pub fn check_output_prefix(descriptor: &mut Descriptor) -> Result<()> {
    if descriptor.prefix().is_empty() {
        return Err(QcError::InvalidArgument(format!(
            "Output prefix of {} should not be empty",
            descriptor.file_name()
        )));
    }
    Ok(())
}

pub fn check_equal_length(
    left_len: usize,
    right_len: usize,
    left_name: &str,
    right_name: &str,
) -> Result<()> {
    if left_len != right_len {
        return Err(QcError::InvalidArgument(format!(
            "Length of {left_name} and {right_name} should be equal"
        )));
    }
    Ok(())
}

/// `exclusive` rejects the bounds themselves.
pub fn check_range_f64(value: f64, min: f64, max: f64, exclusive: bool, name: &str) -> Result<()> {
    if value.is_nan() {
        return Err(QcError::InvalidArgument(format!(
            "Value of {name} should be a number"
        )));
    }
    let below = if exclusive { value <= min } else { value < min };
    if below {
        return Err(QcError::InvalidArgument(format!(
            "Value of {name} should be above {min}"
        )));
    }
    let above = if exclusive { value >= max } else { value > max };
    if above {
        return Err(QcError::InvalidArgument(format!(
            "Value of {name} should be below {max}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(QcError::InvalidArgument(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}
