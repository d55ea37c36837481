use thiserror::Error;

#[derive(Debug, Error)]
pub enum QcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing column: '{column}' not found in the header of {file}")]
    MissingColumn { column: String, file: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("{file}, line {line}: expected {expected} columns but found {actual}")]
    MalformedRow {
        file: String,
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation { what: String, bytes: usize },

    #[error("missing value marker '{marker}' contains the data separator {separator:?}")]
    MissingValueSeparator { marker: String, separator: char },

    #[error("{file}, line {line}: {message}")]
    Region {
        file: String,
        line: usize,
        message: String,
    },

    #[error("line {line} is empty in '{file}'")]
    EmptyLine { file: String, line: usize },

    #[error("{file}: header row is empty")]
    EmptyHeader { file: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QcError {
    pub fn allocation(what: &str, elements: usize, element_size: usize) -> Self {
        QcError::Allocation {
            what: what.to_string(),
            bytes: elements.saturating_mul(element_size),
        }
    }
}

pub type Result<T> = std::result::Result<T, QcError>;
