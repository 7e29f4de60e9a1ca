//! Reads the rule file from disk and compiles it.
//!
//! The file is read once at startup. There is no reload; a bad file is a
//! fatal error for the caller.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::compiler::{compile, CompiledRule};
use crate::error::ConfigError;

/// Load and compile the rule file at `path`.
pub fn load_file(path: &Path) -> Result<Vec<CompiledRule>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let rules = compile(&raw)?;
    info!(path = %path.display(), metrics = rules.len(), "loaded rule configuration");
    for rule in &rules {
        debug!(
            metric = %rule.name,
            matchers = rule.matchers.len(),
            labels = ?rule.label_names(),
            "compiled metric"
        );
    }
    Ok(rules)
}
