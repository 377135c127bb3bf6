//! Core pipeline for kupak: load a pak, render its templates, label the
//! output, and hand it to a cluster runner.
//!
//! `loader` fetches a descriptor and compiles every resource template,
//! `render` reconciles caller values with the property schema and executes the
//! templates, `labels` stamps each rendered object with the installation group,
//! and `manager` ties these together with a `Runner` to install, list, inspect
//! and delete pak instances.

pub mod labels;
pub mod loader;
pub mod manager;
pub mod mock;
pub mod object;
pub mod render;
pub mod runner;
pub mod template;

pub use labels::{
    label_manifests, merge_labels, tracking_labels, GroupIdGenerator, PodTemplatePolicy,
    UuidGroupIds, GROUP_LABEL, SOURCE_LABEL, VALUES_ANNOTATION,
};
pub use loader::{load_pak, CompiledResource, Pak};
pub use manager::{
    InstallReport, InstallStatus, InstalledPak, LabeledPak, Manager, ObjectSummary,
};
pub use mock::MockRunner;
pub use object::{Labels, ObjectError, PodStatus, RenderedObject};
pub use render::{render, Rendered, RenderedManifest};
pub use runner::{KubectlRunner, Runner, RunnerError, TRACKED_KINDS};
pub use template::{Template, TemplateError};

use kupak_remote::RemoteError;
use kupak_schema::{GroupId, IndexError, SchemaError, ValueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("fetch failed: {0}")]
    Fetch(#[source] RemoteError),
    #[error("failed to parse pak '{address}': {source}")]
    Parse {
        address: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid pak '{address}': {source}")]
    Schema {
        address: String,
        #[source]
        source: SchemaError,
    },
    #[error("template '{resource}' does not compile: {source}")]
    TemplateCompile {
        resource: String,
        #[source]
        source: TemplateError,
    },
    #[error("invalid values: {0}")]
    Value(#[from] ValueError),
    #[error("template '{resource}' failed to render: {source}")]
    Render {
        resource: String,
        #[source]
        source: TemplateError,
    },
    #[error("cannot label '{resource}': {source}")]
    LabelMerge {
        resource: String,
        #[source]
        source: ObjectError,
    },
    #[error("cannot generate installation group id: {0}")]
    GroupId(String),
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("runner error: install of group '{group}' aborted ({rollback}): {source}")]
    InstallAborted {
        group: GroupId,
        rollback: String,
        #[source]
        source: RunnerError,
    },
    #[error("invalid repository index '{address}': {source}")]
    Index {
        address: String,
        #[source]
        source: IndexError,
    },
    #[error("pak not found in repository: {0}")]
    PakNotFound(String),
    #[error("no installation group '{group}' in namespace '{namespace}'")]
    GroupNotFound { namespace: String, group: String },
    #[error("config error: {0}")]
    Config(String),
}

impl From<RemoteError> for CoreError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidAddress { address, reason } => {
                CoreError::InvalidAddress { address, reason }
            }
            RemoteError::Config(msg) => CoreError::Config(msg),
            other => CoreError::Fetch(other),
        }
    }
}

impl CoreError {
    /// Errors caused by the pak itself or the values given to it, as opposed
    /// to the environment (network, cluster, configuration).
    pub fn is_pak_error(&self) -> bool {
        matches!(
            self,
            CoreError::Parse { .. }
                | CoreError::Schema { .. }
                | CoreError::TemplateCompile { .. }
                | CoreError::Value(_)
                | CoreError::Render { .. }
                | CoreError::LabelMerge { .. }
        )
    }

    pub fn is_runner_error(&self) -> bool {
        matches!(
            self,
            CoreError::Runner(_) | CoreError::InstallAborted { .. }
        )
    }
}
