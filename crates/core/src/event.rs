//! `core/v1` Event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::{FieldAccess, FieldValue};
use crate::meta::{ListMeta, ObjectMeta, ObjectReference, TypeMeta};

/// A cluster event as delivered by the API server.
///
/// `TypeMeta` and `ObjectMeta` fields are promoted: `Name` and
/// `ObjectMeta.Name` address the same value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub involved_object: ObjectReference,
    pub reason: String,
    pub message: String,
    pub source: EventSource,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub count: i32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub event_time: Option<DateTime<Utc>>,
    pub series: Option<EventSeries>,
    pub action: String,
    pub related: Option<ObjectReference>,
    #[serde(rename = "reportingComponent")]
    pub reporting_controller: String,
    pub reporting_instance: String,
}

impl Event {
    /// Most recent time this event was observed.
    ///
    /// `lastTimestamp` first, then the series' `lastObservedTime`, then
    /// `eventTime` (newer emitters leave `lastTimestamp` unset).
    pub fn last_observed_time(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
            .or_else(|| self.series.as_ref().and_then(|s| s.last_observed_time))
            .or(self.event_time)
    }
}

impl FieldAccess for Event {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "TypeMeta" => FieldValue::Record(&self.type_meta),
            "ObjectMeta" => FieldValue::Record(&self.metadata),
            "InvolvedObject" => FieldValue::Record(&self.involved_object),
            "Reason" => FieldValue::Str(&self.reason),
            "Message" => FieldValue::Str(&self.message),
            "Source" => FieldValue::Record(&self.source),
            "FirstTimestamp" | "LastTimestamp" | "EventTime" => FieldValue::Other("time"),
            "Count" => FieldValue::Other("int32"),
            "Type" => FieldValue::Str(&self.event_type),
            "Series" => FieldValue::Record(self.series.as_ref()?),
            "Action" => FieldValue::Str(&self.action),
            "Related" => FieldValue::Record(self.related.as_ref()?),
            "ReportingController" => FieldValue::Str(&self.reporting_controller),
            "ReportingInstance" => FieldValue::Str(&self.reporting_instance),
            _ => {
                return self
                    .type_meta
                    .field(name)
                    .or_else(|| self.metadata.field(name))
            }
        };
        Some(value)
    }
}

/// Component that reported the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSource {
    pub component: String,
    pub host: String,
}

impl FieldAccess for EventSource {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "Component" => Some(FieldValue::Str(&self.component)),
            "Host" => Some(FieldValue::Str(&self.host)),
            _ => None,
        }
    }
}

/// Series data for events that were deduplicated by the emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSeries {
    pub count: i32,
    pub last_observed_time: Option<DateTime<Utc>>,
}

impl FieldAccess for EventSeries {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "Count" => Some(FieldValue::Other("int32")),
            "LastObservedTime" => Some(FieldValue::Other("time")),
            _ => None,
        }
    }
}

/// Response of `GET /api/v1/events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventList {
    pub metadata: ListMeta,
    pub items: Vec<Event>,
}
