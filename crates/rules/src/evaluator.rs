//! Per-event rule evaluation.
//!
//! Every rule is evaluated independently against the event:
//! - **Matcher pipeline**: each matcher key must resolve on the event and,
//!   if it has an expression, match it. Captures are kept per rule.
//! - **Label pipeline**: every label must resolve, directly on the event,
//!   from a recorded capture group, or on the related pod.
//!
//! A failure in either pipeline skips only that rule for this event.

use std::collections::{BTreeMap, HashMap};

use eventexporter_core::{resolve, Event, Pod};
use regex::Captures;
use tracing::{debug, trace, warn};

use crate::compiler::{CompiledRule, LabelResolver};
use crate::error::{EvalError, LabelError};
use crate::related::{RelatedObjectFetcher, RELATED_OBJECT_KIND};

// ── Results ─────────────────────────────────────────────────────────

/// A rule that fully matched an event, with every label resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Capture groups recorded while matching one rule against one event.
///
/// Index 0 is the whole match. Groups that did not participate are `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmatchTable {
    groups: HashMap<String, Vec<String>>,
}

impl SubmatchTable {
    fn record(&mut self, key: &str, captures: &Captures<'_>) {
        let groups = captures
            .iter()
            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();
        self.groups.insert(key.to_string(), groups);
    }

    pub fn get(&self, key: &str, index: usize) -> Option<&str> {
        self.groups.get(key)?.get(index).map(String::as_str)
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Evaluates compiled rules against events.
pub struct EventEvaluator;

impl EventEvaluator {
    /// Evaluate every rule against `event`.
    ///
    /// Matches come back in rule declaration order. Rules that do not match
    /// are skipped; this never fails as a whole.
    pub async fn evaluate(
        event: &Event,
        rules: &[CompiledRule],
        fetcher: &dyn RelatedObjectFetcher,
    ) -> Vec<FilterMatch> {
        let mut matches = Vec::new();

        for rule in rules {
            match Self::evaluate_rule(event, rule, fetcher).await {
                Ok(found) => matches.push(found),
                Err(e @ EvalError::Label { .. }) => {
                    warn!(metric = %rule.name, error = %e, "skipping metric for event");
                }
                Err(e) => {
                    debug!(metric = %rule.name, error = %e, "event does not match");
                }
            }
        }

        matches
    }

    /// Evaluate a single rule, reporting why it did not match.
    pub async fn evaluate_rule(
        event: &Event,
        rule: &CompiledRule,
        fetcher: &dyn RelatedObjectFetcher,
    ) -> Result<FilterMatch, EvalError> {
        let submatches = match_event(event, rule)?;

        let mut labels = BTreeMap::new();
        for (label, resolver) in &rule.labels {
            let value = resolve_label(event, resolver, &submatches, fetcher)
                .await
                .map_err(|source| EvalError::Label {
                    label: label.clone(),
                    source,
                })?;
            labels.insert(label.clone(), value);
        }

        Ok(FilterMatch {
            name: rule.name.clone(),
            labels,
        })
    }
}

/// Run the matcher pipeline, short-circuiting on the first failure.
fn match_event(event: &Event, rule: &CompiledRule) -> Result<SubmatchTable, EvalError> {
    let mut table = SubmatchTable::default();

    for matcher in &rule.matchers {
        let value = resolve(event, &matcher.key).map_err(|source| EvalError::Field {
            key: matcher.key.clone(),
            source,
        })?;

        // No expression: the field only has to exist.
        let Some(regex) = rule.expression(&matcher.key) else {
            continue;
        };

        let captures = regex.captures(value);
        trace!(
            metric = %rule.name,
            expression = %regex.as_str(),
            value,
            matched = captures.is_some(),
            "evaluated matcher"
        );
        let captures = captures.ok_or_else(|| EvalError::NoMatch {
            key: matcher.key.clone(),
        })?;
        table.record(&matcher.key, &captures);
    }

    Ok(table)
}

async fn resolve_label(
    event: &Event,
    resolver: &LabelResolver,
    submatches: &SubmatchTable,
    fetcher: &dyn RelatedObjectFetcher,
) -> Result<String, LabelError> {
    match resolver {
        LabelResolver::Direct(path) => Ok(resolve(event, path)?.to_string()),
        LabelResolver::Submatch { key, index } => submatches
            .get(key, *index)
            .map(str::to_string)
            .ok_or_else(|| LabelError::MissingSubmatch {
                key: key.clone(),
                index: *index,
            }),
        LabelResolver::RelatedObject(path) => {
            let pod = fetch_related(event, fetcher).await?;
            Ok(resolve(&pod, path)?.to_string())
        }
    }
}

/// Fetch the pod behind `involvedObject`; other kinds fail without I/O.
async fn fetch_related(event: &Event, fetcher: &dyn RelatedObjectFetcher) -> Result<Pod, LabelError> {
    let reference = &event.involved_object;
    if reference.kind != RELATED_OBJECT_KIND {
        return Err(LabelError::UnsupportedKind {
            kind: reference.kind.clone(),
        });
    }
    Ok(fetcher.fetch_pod(&reference.namespace, &reference.name).await?)
}

// ── Tests ───────────────────────────────────────────────────────────
