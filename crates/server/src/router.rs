//! Routes watched events through the age filter into rule evaluation.
//!
//! Each admitted event is evaluated on its own task so one slow pod lookup
//! does not hold up the feed. Deletions are only logged.

use std::sync::Arc;

use chrono::Utc;
use eventexporter_core::Event;
use eventexporter_rules::{AgeFilter, CompiledRule, EventEvaluator, RelatedObjectFetcher};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::kube::{Notification, NotificationHandler};
use crate::metrics::MetricSink;

pub struct EventRouter {
    rules: Arc<Vec<CompiledRule>>,
    fetcher: Arc<dyn RelatedObjectFetcher>,
    sink: Arc<dyn MetricSink>,
    age_filter: AgeFilter,
    in_flight: JoinSet<()>,
}

impl EventRouter {
    pub fn new(
        rules: Arc<Vec<CompiledRule>>,
        fetcher: Arc<dyn RelatedObjectFetcher>,
        sink: Arc<dyn MetricSink>,
        age_filter: AgeFilter,
    ) -> Self {
        Self {
            rules,
            fetcher,
            sink,
            age_filter,
            in_flight: JoinSet::new(),
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.dispatch(event);
    }

    pub fn update_event(&mut self, event: Event) {
        self.dispatch(event);
    }

    pub fn delete_event(&self, event: &Event) {
        debug!(
            namespace = %event.metadata.namespace,
            name = %event.metadata.name,
            reason = %event.reason,
            "event deleted"
        );
    }

    /// Evaluations still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every running evaluation to finish.
    pub async fn drain(&mut self) {
        let pending = self.in_flight.len();
        if pending > 0 {
            info!(pending, "waiting for in-flight evaluations");
        }
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "evaluation task failed");
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "evaluation task failed");
            }
        }

        if self.age_filter.should_discard(&event, Utc::now()) {
            debug!(
                namespace = %event.metadata.namespace,
                name = %event.metadata.name,
                last_observed = ?event.last_observed_time(),
                "discarding old event"
            );
            return;
        }

        let rules = Arc::clone(&self.rules);
        let fetcher = Arc::clone(&self.fetcher);
        let sink = Arc::clone(&self.sink);
        self.in_flight.spawn(async move {
            process_event(&event, &rules, fetcher.as_ref(), sink.as_ref()).await;
        });
    }
}

impl NotificationHandler for EventRouter {
    fn handle(&mut self, notification: Notification) {
        match notification {
            Notification::Added(event) => self.add_event(event),
            Notification::Modified(event) => self.update_event(event),
            Notification::Deleted(event) => self.delete_event(&event),
        }
    }
}

/// Evaluate `event` and increment one counter per match. Returns the match count.
pub async fn process_event(
    event: &Event,
    rules: &[CompiledRule],
    fetcher: &dyn RelatedObjectFetcher,
    sink: &dyn MetricSink,
) -> usize {
    let matches = EventEvaluator::evaluate(event, rules, fetcher).await;
    for found in &matches {
        sink.increment(&found.name, &found.labels);
    }
    matches.len()
}
