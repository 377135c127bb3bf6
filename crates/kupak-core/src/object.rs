//! A parsed view over one rendered manifest.
//!
//! Only the parts kupak needs are interpreted: identity (`kind`,
//! `metadata.name`), top-level and pod-template labels, deletion state and
//! pod status. Everything else is carried through untouched.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("expected a mapping at the top level")]
    NotAMapping,
    #[error("field '{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("object has no pod template")]
    NoPodTemplate,
    #[error("cannot encode annotation: {0}")]
    Encode(serde_json::Error),
}

/// Status summary of a `Pod` as reported by the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PodStatus {
    pub phase: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pod_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedObject {
    doc: Mapping,
}

impl RenderedObject {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ObjectError> {
        let value: Value = serde_yaml::from_slice(data)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ObjectError> {
        match value {
            Value::Mapping(doc) => Ok(Self { doc }),
            _ => Err(ObjectError::NotAMapping),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ObjectError> {
        Ok(serde_yaml::to_string(&self.doc)?.into_bytes())
    }

    pub fn kind(&self) -> &str {
        self.doc.get("kind").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.doc
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Result<Labels, ObjectError> {
        let labels = self.doc.get("metadata").and_then(|m| m.get("labels"));
        labels_from(labels, "metadata.labels")
    }

    pub fn set_labels(&mut self, labels: &Labels) -> Result<(), ObjectError> {
        let slot = self
            .doc
            .entry(Value::from("metadata"))
            .or_insert(Value::Null);
        let metadata = mapping_slot(slot, "metadata")?;
        metadata.insert(Value::from("labels"), labels_to_value(labels));
        Ok(())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.doc
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<(), ObjectError> {
        let slot = self
            .doc
            .entry(Value::from("metadata"))
            .or_insert(Value::Null);
        let metadata = mapping_slot(slot, "metadata")?;
        let slot = metadata
            .entry(Value::from("annotations"))
            .or_insert(Value::Null);
        mapping_slot(slot, "metadata.annotations")?.insert(Value::from(key), Value::from(value));
        Ok(())
    }

    /// Whether the object embeds a pod template (`spec.template.metadata`).
    pub fn has_pod_template(&self) -> bool {
        self.pod_template_metadata().is_some()
    }

    pub fn pod_template_labels(&self) -> Result<Option<Labels>, ObjectError> {
        match self.pod_template_metadata() {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(Labels::new())),
            Some(Value::Mapping(m)) => {
                labels_from(m.get("labels"), "spec.template.metadata.labels").map(Some)
            }
            Some(_) => Err(ObjectError::InvalidField {
                field: "spec.template.metadata",
                reason: "is not a mapping".to_owned(),
            }),
        }
    }

    pub fn set_pod_template_labels(&mut self, labels: &Labels) -> Result<(), ObjectError> {
        let slot = self
            .doc
            .get_mut("spec")
            .and_then(|s| s.get_mut("template"))
            .and_then(Value::as_mapping_mut)
            .and_then(|t| t.get_mut("metadata"))
            .ok_or(ObjectError::NoPodTemplate)?;
        let metadata = mapping_slot(slot, "spec.template.metadata")?;
        metadata.insert(Value::from("labels"), labels_to_value(labels));
        Ok(())
    }

    /// True once the cluster has scheduled the object for deletion.
    pub fn is_deleting(&self) -> bool {
        self.doc
            .get("metadata")
            .and_then(|m| m.get("deletionTimestamp"))
            .is_some_and(|v| !v.is_null())
    }

    pub fn pod_status(&self) -> Option<PodStatus> {
        if self.kind() != "Pod" {
            return None;
        }
        let status = self.doc.get("status")?.as_mapping()?;
        let field = |key: &str| {
            status
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Some(PodStatus {
            phase: field("phase"),
            pod_ip: field("podIP"),
            reason: field("reason"),
            message: field("message"),
        })
    }

    fn pod_template_metadata(&self) -> Option<&Value> {
        self.doc
            .get("spec")
            .and_then(|s| s.get("template"))
            .and_then(Value::as_mapping)
            .and_then(|t| t.get("metadata"))
    }
}

/// Turn an empty slot into a mapping; refuse to overwrite anything else.
fn mapping_slot<'a>(
    slot: &'a mut Value,
    field: &'static str,
) -> Result<&'a mut Mapping, ObjectError> {
    if slot.is_null() {
        *slot = Value::Mapping(Mapping::new());
    }
    slot.as_mapping_mut().ok_or_else(|| ObjectError::InvalidField {
        field,
        reason: "is not a mapping".to_owned(),
    })
}

fn labels_from(value: Option<&Value>, field: &'static str) -> Result<Labels, ObjectError> {
    let mapping = match value {
        None | Some(Value::Null) => return Ok(Labels::new()),
        Some(Value::Mapping(m)) => m,
        Some(_) => {
            return Err(ObjectError::InvalidField {
                field,
                reason: "is not a mapping".to_owned(),
            })
        }
    };
    let mut labels = Labels::new();
    for (key, value) in mapping {
        let (Some(k), Some(v)) = (scalar_text(key), scalar_text(value)) else {
            return Err(ObjectError::InvalidField {
                field,
                reason: "holds a non-scalar entry".to_owned(),
            });
        };
        labels.insert(k, v);
    }
    Ok(labels)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn labels_to_value(labels: &Labels) -> Value {
    let mapping: Mapping = labels
        .iter()
        .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
        .collect();
    Value::Mapping(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RC: &str = r"
apiVersion: v1
kind: ReplicationController
metadata:
  name: web
  labels:
    app: demo
spec:
  replicas: 2
  template:
    metadata:
      labels:
        app: demo
    spec:
      containers:
        - name: web
          image: nginx
";

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn reads_identity_and_labels() {
        let obj = RenderedObject::from_bytes(RC.as_bytes()).unwrap();
        assert_eq!(obj.kind(), "ReplicationController");
        assert_eq!(obj.name(), "web");
        assert_eq!(obj.labels().unwrap(), labels(&[("app", "demo")]));
        assert!(obj.has_pod_template());
        assert_eq!(
            obj.pod_template_labels().unwrap(),
            Some(labels(&[("app", "demo")]))
        );
    }

    #[test]
    fn set_labels_round_trips_through_bytes() {
        let mut obj = RenderedObject::from_bytes(RC.as_bytes()).unwrap();
        obj.set_labels(&labels(&[("app", "demo"), ("tier", "front")]))
            .unwrap();
        obj.set_pod_template_labels(&labels(&[("pak-group", "g1")]))
            .unwrap();

        let reparsed = RenderedObject::from_bytes(&obj.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.labels().unwrap()["tier"], "front");
        assert_eq!(
            reparsed.pod_template_labels().unwrap(),
            Some(labels(&[("pak-group", "g1")]))
        );
        let replicas = reparsed.doc.get("spec").and_then(|s| s.get("replicas"));
        assert_eq!(replicas.and_then(Value::as_u64), Some(2));
    }

    #[test]
    fn missing_metadata_is_created() {
        let mut obj = RenderedObject::from_bytes(b"kind: ConfigMap\n").unwrap();
        assert!(obj.labels().unwrap().is_empty());
        assert_eq!(obj.name(), "");
        obj.set_labels(&labels(&[("a", "b")])).unwrap();
        assert_eq!(obj.labels().unwrap(), labels(&[("a", "b")]));
    }

    #[test]
    fn numeric_label_values_read_as_text() {
        let obj = RenderedObject::from_bytes(b"kind: Pod\nmetadata:\n  labels:\n    version: 2\n").unwrap();
        assert_eq!(obj.labels().unwrap()["version"], "2");
    }

    #[test]
    fn objects_without_template_have_no_pod_labels() {
        let mut obj = RenderedObject::from_bytes(b"kind: Service\nspec:\n  ports: []\n").unwrap();
        assert!(!obj.has_pod_template());
        assert_eq!(obj.pod_template_labels().unwrap(), None);
        assert!(matches!(
            obj.set_pod_template_labels(&Labels::new()),
            Err(ObjectError::NoPodTemplate)
        ));
    }

    #[test]
    fn malformed_template_metadata_is_an_error() {
        let mut obj =
            RenderedObject::from_bytes(b"kind: Deployment\nspec:\n  template:\n    metadata: oops\n")
                .unwrap();
        assert!(obj.has_pod_template());
        assert!(obj.pod_template_labels().is_err());
        assert!(matches!(
            obj.set_pod_template_labels(&Labels::new()),
            Err(ObjectError::InvalidField { .. })
        ));
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        assert!(matches!(
            RenderedObject::from_bytes(b"- a\n- b\n"),
            Err(ObjectError::NotAMapping)
        ));
        assert!(matches!(
            RenderedObject::from_bytes(b"kind: [oops"),
            Err(ObjectError::Parse(_))
        ));
    }

    #[test]
    fn non_mapping_labels_are_rejected() {
        let obj = RenderedObject::from_bytes(b"metadata:\n  labels: [a, b]\n").unwrap();
        assert!(matches!(
            obj.labels(),
            Err(ObjectError::InvalidField { field: "metadata.labels", .. })
        ));
    }

    #[test]
    fn pod_status_and_deletion() {
        let obj = RenderedObject::from_bytes(
            br"
kind: Pod
metadata:
  name: web-1
  deletionTimestamp: 2024-01-01T00:00:00Z
status:
  phase: Failed
  podIP: 10.0.0.7
  reason: Evicted
",
        )
        .unwrap();
        assert!(obj.is_deleting());
        let status = obj.pod_status().unwrap();
        assert_eq!(status.phase, "Failed");
        assert_eq!(status.pod_ip, "10.0.0.7");
        assert_eq!(status.reason, "Evicted");
        assert_eq!(status.message, "");
    }

    #[test]
    fn non_pods_have_no_pod_status() {
        let obj = RenderedObject::from_bytes(b"kind: Service\nstatus:\n  phase: x\n").unwrap();
        assert!(obj.pod_status().is_none());
        assert!(!obj.is_deleting());
    }

    #[test]
    fn annotations_are_added_beside_existing_ones() {
        let mut obj = RenderedObject::from_bytes(
            b"kind: Service\nmetadata:\n  name: web\n  annotations:\n    team: infra\n",
        )
        .unwrap();
        obj.set_annotation("pak-values", "{}").unwrap();
        assert_eq!(obj.annotation("pak-values"), Some("{}"));
        assert_eq!(obj.annotation("team"), Some("infra"));

        let mut bare = RenderedObject::from_bytes(b"kind: Service\n").unwrap();
        assert_eq!(bare.annotation("pak-values"), None);
        bare.set_annotation("pak-values", "{}").unwrap();
        assert_eq!(bare.annotation("pak-values"), Some("{}"));
    }

    #[test]
    fn scalar_annotations_block_is_rejected() {
        let mut obj =
            RenderedObject::from_bytes(b"kind: Service\nmetadata:\n  annotations: 3\n").unwrap();
        assert!(matches!(
            obj.set_annotation("pak-values", "{}"),
            Err(ObjectError::InvalidField { field: "metadata.annotations", .. })
        ));
    }
}
