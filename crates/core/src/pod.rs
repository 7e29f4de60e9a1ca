//! `core/v1` Pod, the only related-object kind labels can be read from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::{FieldAccess, FieldValue};
use crate::meta::{ObjectMeta, TypeMeta};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pod {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    pub status: PodStatus,
}

impl FieldAccess for Pod {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "TypeMeta" => Some(FieldValue::Record(&self.type_meta)),
            "ObjectMeta" => Some(FieldValue::Record(&self.metadata)),
            "Spec" => Some(FieldValue::Record(&self.spec)),
            "Status" => Some(FieldValue::Record(&self.status)),
            _ => self
                .type_meta
                .field(name)
                .or_else(|| self.metadata.field(name)),
        }
    }
}

/// Subset of the pod spec that carries scalar placement/identity data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    pub node_name: String,
    pub service_account_name: String,
    pub hostname: String,
    pub subdomain: String,
    pub scheduler_name: String,
    pub priority_class_name: String,
    pub restart_policy: String,
    pub dns_policy: String,
    pub node_selector: BTreeMap<String, String>,
    pub runtime_class_name: Option<String>,
}

impl FieldAccess for PodSpec {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "NodeName" => FieldValue::Str(&self.node_name),
            "ServiceAccountName" => FieldValue::Str(&self.service_account_name),
            "Hostname" => FieldValue::Str(&self.hostname),
            "Subdomain" => FieldValue::Str(&self.subdomain),
            "SchedulerName" => FieldValue::Str(&self.scheduler_name),
            "PriorityClassName" => FieldValue::Str(&self.priority_class_name),
            "RestartPolicy" => FieldValue::Str(&self.restart_policy),
            "DNSPolicy" => FieldValue::Str(&self.dns_policy),
            "NodeSelector" => FieldValue::Record(&self.node_selector),
            "RuntimeClassName" => FieldValue::Str(self.runtime_class_name.as_deref()?),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodStatus {
    pub phase: String,
    pub message: String,
    pub reason: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    #[serde(rename = "podIP")]
    pub pod_ip: String,
    pub qos_class: String,
    pub nominated_node_name: String,
    pub start_time: Option<DateTime<Utc>>,
}

impl FieldAccess for PodStatus {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "Phase" => FieldValue::Str(&self.phase),
            "Message" => FieldValue::Str(&self.message),
            "Reason" => FieldValue::Str(&self.reason),
            "HostIP" => FieldValue::Str(&self.host_ip),
            "PodIP" => FieldValue::Str(&self.pod_ip),
            "QOSClass" => FieldValue::Str(&self.qos_class),
            "NominatedNodeName" => FieldValue::Str(&self.nominated_node_name),
            "StartTime" => FieldValue::Other("time"),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::resolve;

    #[test]
    fn pod_fields_resolve_from_api_json() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-1", "namespace": "shop", "labels": {"app": "web"}},
            "spec": {"nodeName": "node-7", "dnsPolicy": "ClusterFirst", "nodeSelector": {"zone": "a"}},
            "status": {"phase": "Running", "hostIP": "10.0.0.7", "podIP": "10.1.2.3", "qosClass": "Burstable"}
        }))
        .unwrap();

        assert_eq!(resolve(&pod, "Spec.NodeName").unwrap(), "node-7");
        assert_eq!(resolve(&pod, "Spec.DNSPolicy").unwrap(), "ClusterFirst");
        assert_eq!(resolve(&pod, "Spec.NodeSelector.zone").unwrap(), "a");
        assert_eq!(resolve(&pod, "Status.HostIP").unwrap(), "10.0.0.7");
        assert_eq!(resolve(&pod, "Status.PodIP").unwrap(), "10.1.2.3");
        assert_eq!(resolve(&pod, "Status.QOSClass").unwrap(), "Burstable");
        assert_eq!(resolve(&pod, "Name").unwrap(), "web-1");
        assert_eq!(resolve(&pod, "ObjectMeta.Labels.app").unwrap(), "web");
        assert_eq!(resolve(&pod, "Kind").unwrap(), "Pod");
    }

    #[test]
    fn unset_runtime_class_is_missing() {
        let pod = Pod::default();
        assert!(resolve(&pod, "Spec.RuntimeClassName").is_err());
        assert!(resolve(&pod, "Status.StartTime").is_err());
    }
}
