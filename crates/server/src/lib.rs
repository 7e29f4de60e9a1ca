//! Kubernetes event exporter runtime.
//!
//! Wires the rule engine to a Kubernetes event watch and exposes one
//! Prometheus counter per rule over HTTP.

pub mod http;
pub mod kube;
pub mod metrics;
pub mod router;

pub use metrics::{MetricSink, MetricsError, PrometheusEmitter};
pub use router::{process_event, EventRouter};
