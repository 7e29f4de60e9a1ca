//! Event subscription: list, then watch from the list's resource version.
//!
//! Lines from the watch stream are decoded one at a time. A stream that ends
//! or breaks is resumed from the last resource version seen; an expired
//! resource version (`410 Gone`) forces a fresh list.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use eventexporter_core::{Event, ObjectMeta};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::client::{ApiStatus, KubeClient};
use super::error::KubeError;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// HTTP status the API server uses for an expired resource version.
const GONE: u16 = 410;

// ── Wire format ─────────────────────────────────────────────────────

/// One line of a watch stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent {
    Added(Event),
    Modified(Event),
    Deleted(Event),
    Bookmark(Bookmark),
    Error(ApiStatus),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Bookmark {
    pub metadata: ObjectMeta,
}

/// Splits a byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator. Blank lines are skipped.
    pub fn next_line(&mut self) -> Option<BytesMut> {
        loop {
            let end = self.buffer.iter().position(|b| *b == b'\n')?;
            let mut line = self.buffer.split_to(end);
            self.buffer.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    pub fn has_remainder(&self) -> bool {
        !self.buffer.is_empty()
    }
}

// ── Handler seam ────────────────────────────────────────────────────

/// A change to an event object as delivered to the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Added(Event),
    Modified(Event),
    Deleted(Event),
}

pub trait NotificationHandler: Send {
    fn handle(&mut self, notification: Notification);
}

// ── Watcher ─────────────────────────────────────────────────────────

/// How a single watch stream ended.
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    /// Server closed the stream after `lines` decoded lines.
    Closed { lines: usize },
    /// Resource version expired; relist required.
    Expired,
}

pub struct EventWatcher {
    client: Arc<KubeClient>,
    namespace: Option<String>,
    retry_delay: Duration,
}

impl EventWatcher {
    pub fn new(client: Arc<KubeClient>, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Deliver events to `handler` until a fatal error occurs.
    ///
    /// Only authorization failures end the loop; everything else is logged
    /// and retried after the retry delay.
    pub async fn run<H: NotificationHandler>(&self, handler: &mut H) -> Result<(), KubeError> {
        let mut resume_from: Option<String> = None;

        loop {
            let mut resource_version = match resume_from.take() {
                Some(version) => version,
                None => match self.relist(handler).await {
                    Ok(version) => version,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(error = %e, "listing events failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                },
            };

            match self.stream(&mut resource_version, handler).await {
                Ok(StreamEnd::Closed { lines: 0 }) => {
                    warn!(resource_version = %resource_version, "watch closed without data, backing off");
                    resume_from = Some(resource_version);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Ok(StreamEnd::Closed { lines }) => {
                    debug!(resource_version = %resource_version, lines, "watch closed, resuming");
                    resume_from = Some(resource_version);
                }
                Ok(StreamEnd::Expired) => {
                    info!(resource_version = %resource_version, "resource version expired, relisting");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, resource_version = %resource_version, "watch failed, reconnecting");
                    resume_from = Some(resource_version);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// List all events, hand them over as adds, and return the list version.
    async fn relist<H: NotificationHandler>(&self, handler: &mut H) -> Result<String, KubeError> {
        let list = self.client.list_events(self.namespace.as_deref()).await?;
        info!(
            events = list.items.len(),
            resource_version = %list.metadata.resource_version,
            "listed events"
        );
        for event in list.items {
            handler.handle(Notification::Added(event));
        }
        Ok(list.metadata.resource_version)
    }

    async fn stream<H: NotificationHandler>(
        &self,
        resource_version: &mut String,
        handler: &mut H,
    ) -> Result<StreamEnd, KubeError> {
        let response = match self
            .client
            .watch_events(self.namespace.as_deref(), resource_version)
            .await
        {
            Err(KubeError::Api { status: GONE, .. }) => return Ok(StreamEnd::Expired),
            other => other?,
        };

        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = LineDecoder::default();
        let mut lines = 0;

        while let Some(chunk) = body.next().await {
            decoder.push(&chunk?);
            while let Some(line) = decoder.next_line() {
                lines += 1;
                let event: WatchEvent = match serde_json::from_slice(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable watch line");
                        continue;
                    }
                };
                if let Some(end) = dispatch(event, resource_version, handler)? {
                    return Ok(end);
                }
            }
        }

        if decoder.has_remainder() {
            debug!("watch stream ended with a partial line");
        }
        Ok(StreamEnd::Closed { lines })
    }
}

/// Apply one watch event. Returns `Some` when the stream must end.
fn dispatch<H: NotificationHandler>(
    event: WatchEvent,
    resource_version: &mut String,
    handler: &mut H,
) -> Result<Option<StreamEnd>, KubeError> {
    let (notification, version) = match event {
        WatchEvent::Added(e) => {
            let version = e.metadata.resource_version.clone();
            (Notification::Added(e), version)
        }
        WatchEvent::Modified(e) => {
            let version = e.metadata.resource_version.clone();
            (Notification::Modified(e), version)
        }
        WatchEvent::Deleted(e) => {
            let version = e.metadata.resource_version.clone();
            (Notification::Deleted(e), version)
        }
        WatchEvent::Bookmark(bookmark) => {
            if !bookmark.metadata.resource_version.is_empty() {
                *resource_version = bookmark.metadata.resource_version;
            }
            return Ok(None);
        }
        WatchEvent::Error(status) if status.code == GONE => return Ok(Some(StreamEnd::Expired)),
        WatchEvent::Error(status) => {
            return Err(KubeError::Api {
                status: status.code,
                message: status.message,
            })
        }
    };

    if !version.is_empty() {
        *resource_version = version;
    }
    handler.handle(notification);
    Ok(None)
}
