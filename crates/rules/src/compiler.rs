//! Compiles the rule configuration into immutable, validated rules.
//!
//! Compilation is eager: every expression is compiled and every label spec
//! is classified and checked before anything is returned. A single invalid
//! rule fails the whole configuration.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::{ExporterRules, MatcherSpec, MetricDefinition};

/// Label specs starting with this prefix are read from the related object.
pub const RELATED_OBJECT_PREFIX: &str = "Object.";

// ── Label resolvers ─────────────────────────────────────────────────

/// How a single label value is produced for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelResolver {
    /// Dotted path on the event itself.
    Direct(String),
    /// Dotted path on the pod referenced by the event's involved object.
    RelatedObject(String),
    /// Capture group `index` of the matcher registered under `key`.
    Submatch { key: String, index: usize },
}

impl LabelResolver {
    /// Classify a label spec without validating submatch references.
    ///
    /// Precedence: `Object.` prefix, then `key[N]`, then a direct path.
    pub fn classify(spec: &str) -> Self {
        if let Some(path) = spec.strip_prefix(RELATED_OBJECT_PREFIX) {
            return LabelResolver::RelatedObject(path.to_string());
        }
        match parse_submatch(spec) {
            Some((key, index)) => LabelResolver::Submatch {
                key: key.to_string(),
                index,
            },
            None => LabelResolver::Direct(spec.to_string()),
        }
    }
}

/// Split `Message[1]` into `("Message", 1)`. The index is a single digit.
fn parse_submatch(spec: &str) -> Option<(&str, usize)> {
    let (key, index) = spec.strip_suffix(']')?.rsplit_once('[')?;
    let mut digits = index.chars();
    let digit = digits.next()?.to_digit(10)?;
    if digits.next().is_some() {
        return None;
    }
    Some((key, digit as usize))
}

// ── Compiled rule ───────────────────────────────────────────────────

/// A validated metric definition ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    /// Matchers in declaration order.
    pub matchers: Vec<MatcherSpec>,
    /// Compiled expression per matcher key, only for matchers that have one.
    pub expressions: HashMap<String, Regex>,
    pub labels: BTreeMap<String, LabelResolver>,
}

impl CompiledRule {
    pub fn expression(&self, key: &str) -> Option<&Regex> {
        self.expressions.get(key)
    }

    /// Label names in the order counters are registered with.
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.keys().map(String::as_str).collect()
    }
}

// ── Compilation ─────────────────────────────────────────────────────

/// Parse and compile a YAML rule configuration.
pub fn compile(raw: &str) -> Result<Vec<CompiledRule>, ConfigError> {
    let config: ExporterRules = serde_yaml::from_str(raw)?;
    compile_rules(config)
}

/// Compile already-parsed rules, in declaration order.
pub fn compile_rules(config: ExporterRules) -> Result<Vec<CompiledRule>, ConfigError> {
    let mut seen = HashSet::with_capacity(config.metrics.len());
    let mut compiled = Vec::with_capacity(config.metrics.len());

    for (position, definition) in config.metrics.into_iter().enumerate() {
        if definition.name.is_empty() {
            return Err(ConfigError::EmptyName { position });
        }
        if !seen.insert(definition.name.clone()) {
            return Err(ConfigError::DuplicateMetric {
                metric: definition.name,
            });
        }
        compiled.push(compile_rule(definition)?);
    }

    Ok(compiled)
}

fn compile_rule(definition: MetricDefinition) -> Result<CompiledRule, ConfigError> {
    let MetricDefinition {
        name,
        event_matcher,
        labels,
    } = definition;

    let mut keys = HashSet::with_capacity(event_matcher.len());
    let mut expressions = HashMap::new();

    for matcher in &event_matcher {
        if !keys.insert(matcher.key.as_str()) {
            return Err(ConfigError::DuplicateMatcher {
                metric: name,
                key: matcher.key.clone(),
            });
        }
        if let Some(expr) = matcher.expression() {
            let regex = Regex::new(expr).map_err(|source| ConfigError::InvalidExpression {
                metric: name.clone(),
                key: matcher.key.clone(),
                source,
            })?;
            expressions.insert(matcher.key.clone(), regex);
        }
    }

    let mut resolvers = BTreeMap::new();
    for (label, spec) in labels {
        let resolver = LabelResolver::classify(&spec);
        if let LabelResolver::Submatch { key, index } = &resolver {
            let regex = expressions
                .get(key)
                .ok_or_else(|| ConfigError::SubmatchWithoutExpression {
                    metric: name.clone(),
                    key: key.clone(),
                })?;
            // captures_len counts the implicit whole-match group 0
            if regex.captures_len() - 1 < *index {
                return Err(ConfigError::MissingSubexpression {
                    metric: name,
                    key: key.clone(),
                    index: *index,
                });
            }
        }
        resolvers.insert(label, resolver);
    }

    Ok(CompiledRule {
        name,
        matchers: event_matcher,
        expressions,
        labels: resolvers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_label_specs() {
        assert_eq!(
            LabelResolver::classify("Source.Host"),
            LabelResolver::Direct("Source.Host".to_string())
        );
        assert_eq!(
            LabelResolver::classify("Object.Spec.NodeName"),
            LabelResolver::RelatedObject("Spec.NodeName".to_string())
        );
        assert_eq!(
            LabelResolver::classify("Message[2]"),
            LabelResolver::Submatch {
                key: "Message".to_string(),
                index: 2
            }
        );
    }

    #[test]
    fn related_prefix_wins_over_submatch_syntax() {
        assert_eq!(
            LabelResolver::classify("Object.Spec.NodeName[1]"),
            LabelResolver::RelatedObject("Spec.NodeName[1]".to_string())
        );
    }

    #[test]
    fn only_single_digit_indexes_are_submatches() {
        assert_eq!(
            LabelResolver::classify("Message[12]"),
            LabelResolver::Direct("Message[12]".to_string())
        );
        assert_eq!(
            LabelResolver::classify("Message[x]"),
            LabelResolver::Direct("Message[x]".to_string())
        );
        assert_eq!(
            LabelResolver::classify("Message[]"),
            LabelResolver::Direct("Message[]".to_string())
        );
    }

    #[test]
    fn compiles_rules_in_declaration_order() {
        let rules = compile(
            r#"
metrics:
- name: second_alphabetically_first_declared
  event_matcher:
  - key: Message
    expr: "Volume (.*) mount failed"
  labels:
    volume: Message[1]
    node: Source.Host
    pod_node: Object.Spec.NodeName
- name: a_rule
  event_matcher:
  - key: Type
"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "second_alphabetically_first_declared");
        assert_eq!(rules[1].name, "a_rule");
        assert!(rules[0].expression("Message").is_some());
        assert!(rules[1].expression("Type").is_none());
        assert_eq!(rules[0].label_names(), vec!["node", "pod_node", "volume"]);
        assert_eq!(
            rules[0].labels["volume"],
            LabelResolver::Submatch {
                key: "Message".to_string(),
                index: 1
            }
        );
    }

    #[test]
    fn duplicate_matcher_key_is_fatal() {
        let err = compile(
            r#"
metrics:
- name: dup
  event_matcher:
  - key: Message
    expr: foo
  - key: Message
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration for metric 'dup' invalid: Multiple matchers for key 'Message'"
        );
    }

    #[test]
    fn invalid_expression_is_fatal() {
        let err = compile(
            r#"
metrics:
- name: broken
  event_matcher:
  - key: Message
    expr: "(unclosed"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidExpression { ref metric, ref key, .. } if metric == "broken" && key == "Message"
        ));
    }

    #[test]
    fn submatch_without_expression_is_fatal() {
        let err = compile(
            r#"
metrics:
- name: submatch
  event_matcher:
  - key: Type
    expr: Normal
  labels:
    volume: Message[1]
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration for metric 'submatch' invalid: Can't use a submatch for key 'Message' without a match expression"
        );
    }

    #[test]
    fn submatch_on_existence_only_matcher_is_fatal() {
        let err = compile(
            r#"
metrics:
- name: submatch
  event_matcher:
  - key: Message
  labels:
    whole: Message[0]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SubmatchWithoutExpression { .. }));
    }

    #[test]
    fn submatch_index_beyond_groups_is_fatal() {
        let err = compile(
            r#"
metrics:
- name: submatch
  event_matcher:
  - key: Message
    expr: Normal
  labels:
    volume: Message[1]
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration for metric 'submatch' invalid: Match expression for key 'Message' does not contain 1 subexpressions"
        );
    }

    #[test]
    fn submatch_zero_is_the_whole_match() {
        let rules = compile(
            r#"
metrics:
- name: whole
  event_matcher:
  - key: Message
    expr: Normal
  labels:
    message: Message[0]
"#,
        )
        .unwrap();
        assert_eq!(
            rules[0].labels["message"],
            LabelResolver::Submatch {
                key: "Message".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn empty_and_duplicate_metric_names_are_fatal() {
        let err = compile("metrics:\n- name: \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName { position: 0 }));

        let err = compile("metrics:\n- name: twice\n- name: twice\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMetric { ref metric } if metric == "twice"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = compile("metrics: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
