//! Object metadata shared by every Kubernetes record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::{FieldAccess, FieldValue};

/// `apiVersion` / `kind` header. Often absent on list items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeMeta {
    pub kind: String,
    pub api_version: String,
}

impl FieldAccess for TypeMeta {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "Kind" => Some(FieldValue::Str(&self.kind)),
            "APIVersion" => Some(FieldValue::Str(&self.api_version)),
            _ => None,
        }
    }
}

/// Standard object metadata (`metadata:` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub generate_name: String,
    pub namespace: String,
    pub uid: String,
    pub resource_version: String,
    pub generation: i64,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl FieldAccess for ObjectMeta {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "Name" => FieldValue::Str(&self.name),
            "GenerateName" => FieldValue::Str(&self.generate_name),
            "Namespace" => FieldValue::Str(&self.namespace),
            "UID" => FieldValue::Str(&self.uid),
            "ResourceVersion" => FieldValue::Str(&self.resource_version),
            "Generation" => FieldValue::Other("int64"),
            "CreationTimestamp" => FieldValue::Other("time"),
            "Labels" => FieldValue::Record(&self.labels),
            "Annotations" => FieldValue::Record(&self.annotations),
            _ => return None,
        };
        Some(value)
    }
}

/// Reference to another object, e.g. an event's `involvedObject`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub api_version: String,
    pub resource_version: String,
    pub field_path: String,
}

impl FieldAccess for ObjectReference {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "Kind" => &self.kind,
            "Namespace" => &self.namespace,
            "Name" => &self.name,
            "UID" => &self.uid,
            "APIVersion" => &self.api_version,
            "ResourceVersion" => &self.resource_version,
            "FieldPath" => &self.field_path,
            _ => return None,
        };
        Some(FieldValue::Str(value))
    }
}

/// Metadata of a list response; only the resource version is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMeta {
    pub resource_version: String,
}
