//! Error types for rule compilation and per-event evaluation.

use std::path::PathBuf;

use eventexporter_core::PathError;

use crate::related::FetchError;

/// Fatal configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Rule file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse/deserialization error.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration for metric #{position} invalid: name must not be empty")]
    EmptyName { position: usize },

    #[error("configuration for metric '{metric}' invalid: metric defined more than once")]
    DuplicateMetric { metric: String },

    #[error("configuration for metric '{metric}' invalid: match expression for key {key} invalid: {source}")]
    InvalidExpression {
        metric: String,
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("configuration for metric '{metric}' invalid: Multiple matchers for key '{key}'")]
    DuplicateMatcher { metric: String, key: String },

    #[error("configuration for metric '{metric}' invalid: Can't use a submatch for key '{key}' without a match expression")]
    SubmatchWithoutExpression { metric: String, key: String },

    #[error("configuration for metric '{metric}' invalid: Match expression for key '{key}' does not contain {index} subexpressions")]
    MissingSubexpression {
        metric: String,
        key: String,
        index: usize,
    },
}

/// Why a rule did not produce a match for one event.
///
/// These never abort evaluation of the event; the rule is skipped.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("could not get value for key {key}: {source}")]
    Field {
        key: String,
        #[source]
        source: PathError,
    },

    #[error("value of key {key} does not match its expression")]
    NoMatch { key: String },

    #[error("could not get label '{label}': {source}")]
    Label {
        label: String,
        #[source]
        source: LabelError,
    },
}

/// Failure resolving a single label value.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("no submatch {index} recorded for key '{key}'")]
    MissingSubmatch { key: String, index: usize },

    #[error("related object lookup is not supported for kind '{kind}'")]
    UnsupportedKind { kind: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
