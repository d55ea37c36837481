use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

pub const MARKER: &str = "MARKER";
pub const ALLELE1: &str = "ALLELE1";
pub const ALLELE2: &str = "ALLELE2";
pub const CHR: &str = "CHR";
pub const POSITION: &str = "POSITION";
pub const STRAND: &str = "STRAND";
pub const PVALUE: &str = "PVALUE";
pub const EFFECT: &str = "EFFECT";
pub const STDERR: &str = "STDERR";
pub const FREQLABEL: &str = "FREQLABEL";
pub const HWE_PVAL: &str = "HWE_PVAL";
pub const CALLRATE: &str = "CALLRATE";
pub const N_TOTAL: &str = "N";
pub const IMPUTED: &str = "IMPUTED";
pub const USED_FOR_IMP: &str = "USED_FOR_IMP";
pub const IMP_QUALITY: &str = "IMP_QUALITY";

pub const PVALUE_HQ_1: &str = "PVALUE_HQ_1";
pub const PVALUE_HQ_2: &str = "PVALUE_HQ_2";
pub const PVALUE_FROM0TO1: &str = "PVALUE_FROM0TO1";
pub const PVALUE_MAF_1: &str = "PVALUE_MAF_1";
pub const PVALUE_MAF_2: &str = "PVALUE_MAF_2";
pub const PVALUE_IMP_1: &str = "PVALUE_IMP_1";
pub const PVALUE_IMP_2: &str = "PVALUE_IMP_2";
pub const EFFECT_HQ: &str = "EFFECT_HQ";
pub const EFFECT_SE_RATIO: &str = "EFFECT_SE_RATIO";
pub const IMPUTATION_CROSS_TABLE: &str = "IMPUTED_USED_FOR_IMP";

/// Threshold keys that are not columns.
pub const MAF: &str = "MAF";
pub const IMP: &str = "IMP";
pub const HQ_SNP: &str = "HQ_SNP";

pub const REGION_NAME: &str = "REGION_NAME";
pub const REGION_CHR: &str = "REGION_CHR";
pub const REGION_START: &str = "REGION_START";
pub const REGION_END: &str = "REGION_END";
pub const MAP_MARKER: &str = "MAP_MARKER";
pub const MAP_CHR: &str = "MAP_CHR";
pub const MAP_POSITION: &str = "MAP_POSITION";

pub const ALL_COLUMNS: [&str; 16] = [
    MARKER,
    ALLELE1,
    ALLELE2,
    CHR,
    POSITION,
    STRAND,
    PVALUE,
    EFFECT,
    STDERR,
    FREQLABEL,
    HWE_PVAL,
    CALLRATE,
    N_TOTAL,
    IMPUTED,
    USED_FOR_IMP,
    IMP_QUALITY,
];

pub const MANDATORY_COLUMNS: [&str; 11] = [
    MARKER,
    ALLELE1,
    ALLELE2,
    CHR,
    POSITION,
    STRAND,
    PVALUE,
    EFFECT,
    STDERR,
    FREQLABEL,
    IMP_QUALITY,
];

pub const THRESHOLD_COLUMNS: [&str; 6] = [PVALUE, STDERR, FREQLABEL, IMP_QUALITY, HWE_PVAL, CALLRATE];

pub const FILTER_LEVELS: [&str; 3] = [MAF, IMP, HQ_SNP];

/// Pairs `(present, missing)` watched by the dependency tracker.
pub const DEPENDENCY_PAIRS: [(&str, &str); 15] = [
    (EFFECT, MARKER),
    (EFFECT, CHR),
    (EFFECT, POSITION),
    (STDERR, MARKER),
    (STDERR, CHR),
    (STDERR, POSITION),
    (PVALUE, MARKER),
    (PVALUE, CHR),
    (PVALUE, POSITION),
    (EFFECT, STDERR),
    (EFFECT, PVALUE),
    (STDERR, EFFECT),
    (STDERR, PVALUE),
    (PVALUE, EFFECT),
    (PVALUE, STDERR),
];

/// QQ-plot groups: figure name and the filtered metas drawn in it.
pub const QQ_PLOT_GROUPS: [(&str, [&str; 3]); 3] = [
    ("qqplot_MAF", [PVALUE_MAF_2, PVALUE_MAF_1, PVALUE_FROM0TO1]),
    ("qqplot_IMP", [PVALUE_IMP_2, PVALUE_IMP_1, PVALUE_FROM0TO1]),
    ("qqplot_MAF_IMP", [PVALUE_HQ_2, PVALUE_HQ_1, PVALUE_FROM0TO1]),
];

pub const QUANTILE_LEVELS: [f64; 9] = [0.0, 0.01, 0.05, 0.25, 0.5, 0.75, 0.95, 0.99, 1.0];

pub const RATIO_SLICES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 1.0];

pub const DEFAULT_THRESHOLDS: [(&str, [f64; 2]); 9] = [
    (STDERR, [0.0, 100000.0]),
    (IMP_QUALITY, [0.0, 1.5]),
    (PVALUE, [0.0, 1.0]),
    (FREQLABEL, [0.0, 1.0]),
    (HWE_PVAL, [0.0, 1.0]),
    (CALLRATE, [0.0, 1.0]),
    (MAF, [0.01, 0.05]),
    (IMP, [0.3, 0.6]),
    (HQ_SNP, [0.01, 0.3]),
];

pub const DEFAULT_MISSING: &str = "NA";
pub const DEFAULT_PREFIX: &str = "gwasqc_";
pub const FREQ_FOLD_THRESHOLD: f64 = 0.5;

/// Field separators recognised in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Separator {
    Comma,
    Tab,
    Whitespace,
    Semicolon,
}

impl Separator {
    pub const ALL: [Separator; 4] = [
        Separator::Comma,
        Separator::Tab,
        Separator::Whitespace,
        Separator::Semicolon,
    ];

    pub fn as_char(self) -> char {
        match self {
            Separator::Comma => ',',
            Separator::Tab => '\t',
            Separator::Whitespace => ' ',
            Separator::Semicolon => ';',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Separator::Comma => "COMMA",
            Separator::Tab => "TAB",
            Separator::Whitespace => "WHITESPACE",
            Separator::Semicolon => "SEMICOLON",
        }
    }

    /// Script name of a separator; `COMMAS` and `TABULATION` are accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("COMMAS") {
            return Some(Separator::Comma);
        }
        if name.eq_ignore_ascii_case("TABULATION") {
            return Some(Separator::Tab);
        }
        Separator::ALL
            .into_iter()
            .find(|sep| sep.name().eq_ignore_ascii_case(name))
    }

    pub fn from_char(c: char) -> Option<Self> {
        Separator::ALL.into_iter().find(|sep| sep.as_char() == c)
    }

    /// Separator used to join several region names inside one field.
    pub fn region_separator(self) -> char {
        if self == Separator::Comma { ';' } else { ',' }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How identifiers (alleles, chromosomes, markers) are compared within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CasePolicy {
    Sensitive,
    #[default]
    Insensitive,
}

impl CasePolicy {
    pub fn from_flag(sensitive: bool) -> Self {
        if sensitive {
            CasePolicy::Sensitive
        } else {
            CasePolicy::Insensitive
        }
    }

    /// Canonical key used for hashing and ordering.
    pub fn key<'a>(self, value: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::Sensitive => Cow::Borrowed(value),
            CasePolicy::Insensitive if value.bytes().any(|b| b.is_ascii_lowercase()) => {
                Cow::Owned(value.to_ascii_uppercase())
            }
            CasePolicy::Insensitive => Cow::Borrowed(value),
        }
    }

    pub fn eq(self, left: &str, right: &str) -> bool {
        match self {
            CasePolicy::Sensitive => left == right,
            CasePolicy::Insensitive => left.eq_ignore_ascii_case(right),
        }
    }

    pub fn cmp(self, left: &str, right: &str) -> Ordering {
        match self {
            CasePolicy::Sensitive => left.cmp(right),
            CasePolicy::Insensitive => cmp_ignore_case(left, right),
        }
    }
}

pub fn cmp_ignore_case(left: &str, right: &str) -> Ordering {
    left.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(right.bytes().map(|b| b.to_ascii_lowercase()))
}

/// Full names printed in reports for known columns.
pub fn full_name(common_name: &str) -> Option<&'static str> {
    match common_name {
        STDERR => Some("Standard error"),
        IMP_QUALITY => Some("Imputation quality"),
        PVALUE => Some("P-value"),
        FREQLABEL => Some("Minor allele frequency"),
        HWE_PVAL => Some("Hardy-Weinberg equilibrium p-value"),
        CALLRATE => Some("Genotyping callrate"),
        EFFECT => Some("Effect size"),
        N_TOTAL => Some("Sample size"),
        POSITION => Some("Position"),
        IMPUTED => Some("Imputed"),
        USED_FOR_IMP => Some("Used for imputation"),
        _ => None,
    }
}
