//! Prometheus counters, one per compiled rule.
//!
//! Every rule gets a `CounterVec` registered at startup whose label names
//! are the rule's label keys. Matches only ever increment existing counters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use eventexporter_rules::CompiledRule;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

/// Errors raised while registering or rendering metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to register metric '{metric}': {source}")]
    Register {
        metric: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("encoded metrics are not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Receives one increment per match.
pub trait MetricSink: Send + Sync {
    fn increment(&self, metric: &str, labels: &BTreeMap<String, String>);
}

/// Counter registry exposed on `/metrics`.
#[derive(Clone)]
pub struct PrometheusEmitter {
    registry: Registry,
    counters: HashMap<String, CounterVec>,
}

impl fmt::Debug for PrometheusEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut metrics: Vec<&str> = self.counters.keys().map(String::as_str).collect();
        metrics.sort_unstable();
        f.debug_struct("PrometheusEmitter")
            .field("metrics", &metrics)
            .finish()
    }
}

impl PrometheusEmitter {
    /// Register a counter for every rule.
    ///
    /// Fails if a rule name is not a valid metric name or collides with one
    /// already registered.
    pub fn register(rules: &[CompiledRule]) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let mut counters = HashMap::with_capacity(rules.len());

        for rule in rules {
            let opts = Opts::new(
                rule.name.clone(),
                format!("Kubernetes Eventexporter Metric {}", rule.name),
            );
            let counter = CounterVec::new(opts, &rule.label_names())
                .and_then(|counter| {
                    registry.register(Box::new(counter.clone()))?;
                    Ok(counter)
                })
                .map_err(|source| MetricsError::Register {
                    metric: rule.name.clone(),
                    source,
                })?;
            debug!(metric = %rule.name, labels = ?rule.label_names(), "registered counter");
            counters.insert(rule.name.clone(), counter);
        }

        Ok(Self { registry, counters })
    }

    /// Render every registered counter in the text exposition format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl MetricSink for PrometheusEmitter {
    fn increment(&self, metric: &str, labels: &BTreeMap<String, String>) {
        let Some(counter) = self.counters.get(metric) else {
            warn!(metric, "no counter registered for metric");
            return;
        };
        let values: HashMap<&str, &str> = labels
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        match counter.get_metric_with(&values) {
            Ok(child) => child.inc(),
            Err(e) => warn!(metric, error = %e, "label set does not match registered counter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use eventexporter_rules::compile;

    use super::*;

    fn emitter() -> PrometheusEmitter {
        let rules = compile(
            r#"
metrics:
- name: pod_backoff
  labels:
    node: Source.Host
    reason: Reason
- name: any_event
"#,
        )
        .unwrap();
        PrometheusEmitter::register(&rules).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn counts_increments_per_label_set() {
        let emitter = emitter();
        let a = labels(&[("node", "n1"), ("reason", "BackOff")]);
        let b = labels(&[("node", "n2"), ("reason", "BackOff")]);

        emitter.increment("pod_backoff", &a);
        emitter.increment("pod_backoff", &a);
        emitter.increment("pod_backoff", &b);
        emitter.increment("any_event", &BTreeMap::new());

        let text = emitter.encode().unwrap();
        assert!(text.contains("# HELP pod_backoff Kubernetes Eventexporter Metric pod_backoff"));
        assert!(text.contains("# TYPE pod_backoff counter"));
        assert!(text.contains(r#"pod_backoff{node="n1",reason="BackOff"} 2"#));
        assert!(text.contains(r#"pod_backoff{node="n2",reason="BackOff"} 1"#));
        assert!(text.contains("any_event 1"));
    }

    #[test]
    fn mismatched_labels_and_unknown_metrics_are_ignored() {
        let emitter = emitter();
        emitter.increment("pod_backoff", &labels(&[("node", "n1")]));
        emitter.increment("not_registered", &BTreeMap::new());

        let text = emitter.encode().unwrap();
        assert!(!text.contains("pod_backoff{"));
        assert!(!text.contains("not_registered"));
    }

    #[test]
    fn invalid_metric_name_fails_registration() {
        let rules = compile("metrics:\n- name: has-dash\n").unwrap();
        let err = PrometheusEmitter::register(&rules).unwrap_err();
        assert!(matches!(err, MetricsError::Register { ref metric, .. } if metric == "has-dash"));
    }

    #[test]
    fn text_content_type() {
        assert!(emitter().content_type().starts_with("text/plain"));
    }
}
