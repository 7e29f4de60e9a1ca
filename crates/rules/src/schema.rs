//! YAML schema of the rule configuration.
//!
//! ```yaml
//! metrics:
//!   - name: pod_created
//!     event_matcher:
//!       - key: InvolvedObject.Kind
//!         expr: Pod
//!     labels:
//!       node: Source.Host
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterRules {
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
}

/// One metric: the matchers an event must pass and the labels to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDefinition {
    pub name: String,
    /// Evaluated in declaration order.
    #[serde(default)]
    pub event_matcher: Vec<MatcherSpec>,
    /// Label name → label spec.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A required field, optionally gated by a regular expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherSpec {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

impl MatcherSpec {
    /// The match expression, if one is set and non-empty.
    pub fn expression(&self) -> Option<&str> {
        self.expr.as_deref().filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let rules: ExporterRules = serde_yaml::from_str(
            r#"
metrics:
- name: metric_1
  event_matcher:
  - key: InvolvedObject.Kind
    expr: Pod
  - key: Source.Host
  labels:
    node: Source.Host
    type: Type
"#,
        )
        .unwrap();

        assert_eq!(rules.metrics.len(), 1);
        let metric = &rules.metrics[0];
        assert_eq!(metric.name, "metric_1");
        assert_eq!(metric.event_matcher[0].expression(), Some("Pod"));
        assert_eq!(metric.event_matcher[1].expression(), None);
        assert_eq!(metric.labels["node"], "Source.Host");
    }

    #[test]
    fn blank_expression_counts_as_absent() {
        let matcher: MatcherSpec = serde_yaml::from_str("key: Message\nexpr: \"\"\n").unwrap();
        assert_eq!(matcher.expression(), None);

        let matcher: MatcherSpec = serde_yaml::from_str("key: Message\nexpr:\n").unwrap();
        assert_eq!(matcher.expression(), None);
    }

    #[test]
    fn matchers_and_labels_are_optional() {
        let rules: ExporterRules = serde_yaml::from_str("metrics:\n- name: every_event\n").unwrap();
        assert!(rules.metrics[0].event_matcher.is_empty());
        assert!(rules.metrics[0].labels.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ExporterRules, _> = serde_yaml::from_str(
            r#"
metrics:
- name: typo
  event_matchers:
  - key: Message
"#,
        );
        assert!(result.is_err());
    }
}
