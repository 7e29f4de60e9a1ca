//! Event matching and label-extraction engine.
//!
//! This crate provides:
//! - YAML rule configuration with serde deserialization
//! - An eager compiler that validates matchers and label specs up front
//! - A per-event evaluator producing `(metric, labels)` matches
//! - The related-object lookup seam and the age-based discard filter

pub mod compiler;
pub mod discard;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod related;
pub mod schema;

pub use compiler::{compile, compile_rules, CompiledRule, LabelResolver, RELATED_OBJECT_PREFIX};
pub use discard::AgeFilter;
pub use error::{ConfigError, EvalError, LabelError};
pub use evaluator::{EventEvaluator, FilterMatch, SubmatchTable};
pub use loader::load_file;
pub use related::{FetchError, RelatedObjectFetcher, RELATED_OBJECT_KIND};
pub use schema::{ExporterRules, MatcherSpec, MetricDefinition};
