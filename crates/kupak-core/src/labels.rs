//! Installation-group labeling.
//!
//! Every object created by one install carries the same `pak-group` label
//! plus the address of the pak it came from. Labels go on the object itself
//! and, for controllers, on the pod template so that the pods they spawn can
//! be found by the same selector.

use crate::object::{Labels, RenderedObject};
use crate::render::RenderedManifest;
use crate::CoreError;
use kupak_schema::GroupId;
use tracing::warn;

pub const GROUP_LABEL: &str = "pak-group";
pub const SOURCE_LABEL: &str = "pak-source-url";
/// Annotation holding the JSON of the values a group was installed with.
pub const VALUES_ANNOTATION: &str = "pak-values";

/// Source of installation group ids.
pub trait GroupIdGenerator {
    fn generate(&self) -> Result<GroupId, CoreError>;
}

/// Random UUID v4 group ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGroupIds;

impl GroupIdGenerator for UuidGroupIds {
    fn generate(&self) -> Result<GroupId, CoreError> {
        Ok(GroupId::new(uuid::Uuid::new_v4().to_string()))
    }
}

/// What to do when the labels of an embedded pod template cannot be merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PodTemplatePolicy {
    /// Warn and leave the pod template as rendered.
    #[default]
    Lenient,
    /// Fail the install.
    Strict,
}

/// Right-biased union: keys in `overlay` replace those in `base`.
pub fn merge_labels(base: &Labels, overlay: &Labels) -> Labels {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

pub fn tracking_labels(group: &GroupId, source_url: &str) -> Labels {
    Labels::from([
        (GROUP_LABEL.to_owned(), group.to_string()),
        (SOURCE_LABEL.to_owned(), source_url.to_owned()),
    ])
}

/// Parse each rendered manifest and merge `tracking` into its labels and,
/// where present, its pod-template labels.
pub fn label_manifests(
    manifests: &[RenderedManifest],
    tracking: &Labels,
    policy: PodTemplatePolicy,
) -> Result<Vec<RenderedObject>, CoreError> {
    manifests
        .iter()
        .map(|m| label_one(m, tracking, policy))
        .collect()
}

fn label_one(
    manifest: &RenderedManifest,
    tracking: &Labels,
    policy: PodTemplatePolicy,
) -> Result<RenderedObject, CoreError> {
    let fail = |source| CoreError::LabelMerge {
        resource: manifest.resource.clone(),
        source,
    };

    let mut object = RenderedObject::from_bytes(&manifest.bytes).map_err(fail)?;
    let labels = object.labels().map_err(fail)?;
    object
        .set_labels(&merge_labels(&labels, tracking))
        .map_err(fail)?;

    if object.has_pod_template() {
        let nested = object.pod_template_labels().and_then(|current| {
            let merged = merge_labels(&current.unwrap_or_default(), tracking);
            object.set_pod_template_labels(&merged)
        });
        match (nested, policy) {
            (Ok(()), _) => {}
            (Err(e), PodTemplatePolicy::Lenient) => {
                warn!(
                    "{}: pod template of {} '{}' left unlabeled: {e}",
                    manifest.resource,
                    object.kind(),
                    object.name()
                );
            }
            (Err(e), PodTemplatePolicy::Strict) => return Err(fail(e)),
        }
    }
    Ok(object)
}
