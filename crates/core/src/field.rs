//! Dotted-path navigation over typed records.
//!
//! Each record type implements [`FieldAccess`] and names its own fields, so
//! path resolution is a plain walk over trait objects with no reflection.
//! Absent optional sub-records report `None` and fail the walk; string fields
//! that are merely empty still resolve (to `""`).

use std::collections::BTreeMap;

use crate::error::PathError;

/// A field as seen by path navigation.
#[derive(Clone, Copy)]
pub enum FieldValue<'a> {
    /// A string leaf.
    Str(&'a str),
    /// A nested record further segments can descend into.
    Record(&'a dyn FieldAccess),
    /// A present value that is neither a string nor navigable.
    /// Carries a short type name for diagnostics (`"time"`, `"int32"`).
    Other(&'static str),
}

impl FieldValue<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Record(_) => "record",
            FieldValue::Other(name) => name,
        }
    }
}

/// Read-only access to a record's fields by name.
pub trait FieldAccess {
    /// Look up a single field. `None` means the record has no such field.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// String maps (labels, annotations, node selectors) are navigable by key.
impl FieldAccess for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        self.get(name).map(|v| FieldValue::Str(v.as_str()))
    }
}

/// Resolve `path` (e.g. `Source.Host`) against `record`.
///
/// Walks the segments left to right and fails on the first segment that
/// does not name a field. Succeeds only when the final value is a string.
pub fn resolve<'a>(record: &'a dyn FieldAccess, path: &str) -> Result<&'a str, PathError> {
    let mut current = FieldValue::Record(record);

    for (index, segment) in path.split('.').enumerate() {
        let FieldValue::Record(inner) = current else {
            return Err(PathError::NotARecord {
                segment: segment.to_string(),
                index,
            });
        };
        current = inner.field(segment).ok_or_else(|| PathError::MissingField {
            segment: segment.to_string(),
            index,
        })?;
    }

    match current {
        FieldValue::Str(value) => Ok(value),
        other => Err(PathError::NotAString {
            path: path.to_string(),
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventSource};
    use crate::meta::{ObjectMeta, ObjectReference};

    fn sample_event() -> Event {
        Event {
            metadata: ObjectMeta {
                name: "web-1.17a".to_string(),
                namespace: "default".to_string(),
                labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: "Pod".to_string(),
                name: "web-1".to_string(),
                ..Default::default()
            },
            message: "Created container".to_string(),
            source: EventSource {
                host: "node-a".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn resolves_top_level_and_nested_strings() {
        let event = sample_event();
        assert_eq!(resolve(&event, "Message").unwrap(), "Created container");
        assert_eq!(resolve(&event, "InvolvedObject.Kind").unwrap(), "Pod");
        assert_eq!(resolve(&event, "Source.Host").unwrap(), "node-a");
    }

    #[test]
    fn resolves_promoted_metadata_fields() {
        let event = sample_event();
        assert_eq!(resolve(&event, "Namespace").unwrap(), "default");
        assert_eq!(resolve(&event, "ObjectMeta.Name").unwrap(), "web-1.17a");
        assert_eq!(resolve(&event, "ObjectMeta.Labels.app").unwrap(), "web");
    }

    #[test]
    fn empty_string_field_still_resolves() {
        let event = sample_event();
        assert_eq!(resolve(&event, "Reason").unwrap(), "");
    }

    #[test]
    fn missing_field_reports_segment_and_index() {
        let event = sample_event();
        let err = resolve(&event, "Source.Nase").unwrap_err();
        assert_eq!(
            err,
            PathError::MissingField {
                segment: "Nase".to_string(),
                index: 1
            }
        );
        assert_eq!(err.to_string(), "extracting value failed at Nase, index 1");
    }

    #[test]
    fn non_string_leaf_is_an_error() {
        let event = sample_event();
        let err = resolve(&event, "Count").unwrap_err();
        assert!(matches!(err, PathError::NotAString { found: "int32", .. }));

        let err = resolve(&event, "Source").unwrap_err();
        assert!(matches!(err, PathError::NotAString { found: "record", .. }));
    }

    #[test]
    fn descending_into_a_string_is_an_error() {
        let event = sample_event();
        let err = resolve(&event, "Message.Length").unwrap_err();
        assert!(matches!(err, PathError::NotARecord { index: 1, .. }));
    }

    #[test]
    fn absent_optional_record_is_missing() {
        let event = sample_event();
        assert!(matches!(
            resolve(&event, "Related.Name"),
            Err(PathError::MissingField { index: 0, .. })
        ));
    }

    #[test]
    fn empty_path_is_missing() {
        let event = sample_event();
        assert!(matches!(
            resolve(&event, ""),
            Err(PathError::MissingField { index: 0, .. })
        ));
        assert!(matches!(
            resolve(&event, "Source."),
            Err(PathError::MissingField { index: 1, .. })
        ));
    }
}
