//! Kubernetes record model and typed field access for the event exporter.
//!
//! The rule engine never touches JSON directly: events and related objects
//! are deserialized into the structs in [`event`], [`meta`] and [`pod`], and
//! rules address their fields through [`field::FieldAccess`] using the Go
//! field names (`InvolvedObject.Kind`, `Spec.NodeName`).

pub mod config;
pub mod error;
pub mod event;
pub mod field;
pub mod meta;
pub mod pod;

pub use config::{ExporterConfig, KubeSettings};
pub use error::*;
pub use event::*;
pub use field::{resolve, FieldAccess, FieldValue};
pub use meta::*;
pub use pod::*;
