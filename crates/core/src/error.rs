use thiserror::Error;

/// Failure to resolve a dotted path against a record.
///
/// `index` is the zero-based position of the offending segment in the path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("extracting value failed at {segment}, index {index}")]
    MissingField { segment: String, index: usize },

    #[error("extracting value failed at {segment}, index {index}: parent is not a record")]
    NotARecord { segment: String, index: usize },

    #[error("value at {path} is not a string (found {found})")]
    NotAString { path: String, found: &'static str },
}
