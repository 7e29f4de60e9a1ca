//! Kubernetes API access over `reqwest`.
//!
//! Just enough of the API for the exporter: credential loading, single pod
//! lookups for related-object labels, and the list/watch feed of events.

pub mod client;
pub mod config;
pub mod error;
pub mod watch;

pub use client::{ApiStatus, KubeClient};
pub use config::{ClusterConfig, TokenSource};
pub use error::KubeError;
pub use watch::{EventWatcher, LineDecoder, Notification, NotificationHandler, WatchEvent};
