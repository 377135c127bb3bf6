use crate::labels::{
    label_manifests, tracking_labels, GroupIdGenerator, PodTemplatePolicy, GROUP_LABEL,
    SOURCE_LABEL, VALUES_ANNOTATION,
};
use crate::loader::{load_pak, Pak};
use crate::object::{ObjectError, PodStatus, RenderedObject};
use crate::render::{render, Rendered, RenderedManifest};
use crate::runner::{Runner, RunnerError};
use crate::CoreError;
use kupak_remote::{resolve, Fetcher};
use kupak_schema::{is_bare_name, parse_pak_ref, GroupId, PakId, RepoIndex, ValueMap};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Observed state of one installation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Running,
    Deleting,
    Error,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallStatus::Running => "running",
            InstallStatus::Deleting => "deleting",
            InstallStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodStatus>,
}

impl ObjectSummary {
    fn of(object: &RenderedObject) -> Self {
        Self {
            kind: object.kind().to_owned(),
            name: object.name().to_owned(),
            pod: object.pod_status(),
        }
    }
}

/// One installation of a pak as found in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPak {
    pub group: GroupId,
    pub namespace: String,
    pub pak_url: String,
    /// Values the group was installed with, after defaults and normalization.
    pub properties: ValueMap,
    pub objects: Vec<ObjectSummary>,
    pub status: InstallStatus,
}

impl InstalledPak {
    fn from_objects(group: GroupId, namespace: &str, objects: &[RenderedObject]) -> Self {
        let pak_url = objects
            .iter()
            .find_map(|o| o.labels().ok()?.remove(SOURCE_LABEL))
            .unwrap_or_default();
        let properties = objects
            .iter()
            .find_map(|o| o.annotation(VALUES_ANNOTATION))
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        Self {
            group,
            namespace: namespace.to_owned(),
            pak_url,
            properties,
            objects: objects.iter().map(ObjectSummary::of).collect(),
            status: derive_status(objects),
        }
    }
}

fn derive_status(objects: &[RenderedObject]) -> InstallStatus {
    if objects.iter().any(RenderedObject::is_deleting) {
        InstallStatus::Deleting
    } else if objects
        .iter()
        .filter_map(RenderedObject::pod_status)
        .any(|s| s.phase == "Failed")
    {
        InstallStatus::Error
    } else {
        InstallStatus::Running
    }
}

/// What `install` created.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub group: GroupId,
    pub namespace: String,
    pub pak_name: String,
    pub pak_version: String,
    pub pak_url: String,
    pub pak_id: PakId,
    pub objects: Vec<ObjectSummary>,
    pub installed_at: String,
}

/// Rendered and labeled output of a pak, not yet handed to the runner.
#[derive(Debug, Clone)]
pub struct LabeledPak {
    pub group: GroupId,
    pub manifests: Vec<RenderedManifest>,
    pub objects: Vec<ObjectSummary>,
}

pub struct Manager {
    fetcher: Box<dyn Fetcher>,
    runner: Box<dyn Runner>,
    repo: Option<String>,
    policy: PodTemplatePolicy,
}

impl Manager {
    pub fn new(fetcher: Box<dyn Fetcher>, runner: Box<dyn Runner>) -> Self {
        Self {
            fetcher,
            runner,
            repo: None,
            policy: PodTemplatePolicy::default(),
        }
    }

    /// Repository index used to resolve bare pak names.
    #[must_use]
    pub fn with_repo(mut self, repo: Option<String>) -> Self {
        self.repo = repo;
        self
    }

    #[must_use]
    pub fn with_pod_template_policy(mut self, policy: PodTemplatePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn repo(&self) -> Result<&str, CoreError> {
        self.repo.as_deref().ok_or_else(|| {
            CoreError::Config("no repository configured (use --repo or KUPAK_REPO)".to_owned())
        })
    }

    pub fn index(&self) -> Result<RepoIndex, CoreError> {
        let repo = self.repo()?;
        let data = self.fetcher.fetch(repo)?;
        RepoIndex::from_bytes(&data).map_err(|source| CoreError::Index {
            address: repo.to_owned(),
            source,
        })
    }

    /// Turn a pak reference into the address of its descriptor.
    pub fn locate(&self, reference: &str) -> Result<String, CoreError> {
        if !is_bare_name(reference) {
            return Ok(reference.to_owned());
        }
        let (name, version) = parse_pak_ref(reference);
        let index = self.index()?;
        let entry = index
            .lookup(name, version)
            .ok_or_else(|| CoreError::PakNotFound(reference.to_owned()))?;
        let address = resolve(self.repo()?, &entry.url)?;
        debug!("{reference} -> {address}");
        Ok(address)
    }

    pub fn load(&self, reference: &str) -> Result<Pak, CoreError> {
        let address = self.locate(reference)?;
        load_pak(self.fetcher.as_ref(), &address)
    }

    /// Render and label `pak` without touching the cluster.
    pub fn render_labeled(
        &self,
        pak: &Pak,
        values: &ValueMap,
        ids: &dyn GroupIdGenerator,
    ) -> Result<LabeledPak, CoreError> {
        let Rendered {
            values: prepared,
            manifests: rendered,
        } = render(pak, values)?;
        let recorded = serde_json::to_string(&prepared).map_err(|e| CoreError::LabelMerge {
            resource: pak.source_url.clone(),
            source: ObjectError::Encode(e),
        })?;

        let group = ids.generate()?;
        let tracking = tracking_labels(&group, &pak.source_url);
        let mut objects = label_manifests(&rendered, &tracking, self.policy)?;

        let mut manifests = Vec::with_capacity(objects.len());
        for (raw, object) in rendered.iter().zip(&mut objects) {
            let fail = |source| CoreError::LabelMerge {
                resource: raw.resource.clone(),
                source,
            };
            object
                .set_annotation(VALUES_ANNOTATION, &recorded)
                .map_err(fail)?;
            let bytes = object.to_bytes().map_err(fail)?;
            manifests.push(RenderedManifest {
                resource: raw.resource.clone(),
                bytes,
            });
        }

        Ok(LabeledPak {
            group,
            manifests,
            objects: objects.iter().map(ObjectSummary::of).collect(),
        })
    }

    /// Render, label, and create every object of `pak` in `namespace`, in
    /// resource order. If any create fails, whatever was already created for
    /// the group is deleted again before the error is returned.
    pub fn install(
        &self,
        pak: &Pak,
        namespace: &str,
        values: &ValueMap,
        ids: &dyn GroupIdGenerator,
    ) -> Result<InstallReport, CoreError> {
        if !self.runner.available() {
            return Err(RunnerError::Unavailable(self.runner.name().to_owned()).into());
        }
        let labeled = self.render_labeled(pak, values, ids)?;
        for manifest in &labeled.manifests {
            debug!("creating {} in {namespace}", manifest.resource);
            if let Err(source) = self.runner.create(namespace, &manifest.bytes) {
                let rollback = self.roll_back(namespace, &labeled.group);
                return Err(CoreError::InstallAborted {
                    group: labeled.group,
                    rollback,
                    source,
                });
            }
        }
        info!(
            "installed {} {} as group {} in {namespace}",
            pak.name(),
            pak.version(),
            labeled.group
        );
        Ok(InstallReport {
            group: labeled.group,
            namespace: namespace.to_owned(),
            pak_name: pak.name().to_owned(),
            pak_version: pak.version().to_owned(),
            pak_url: pak.source_url.clone(),
            pak_id: pak.identity().pak_id,
            objects: labeled.objects,
            installed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Every installation group in `namespace`, ordered by group id.
    pub fn installed(&self, namespace: &str) -> Result<Vec<InstalledPak>, CoreError> {
        let objects = self.runner.list_by_selector(namespace, GROUP_LABEL)?;
        let mut groups: BTreeMap<String, Vec<RenderedObject>> = BTreeMap::new();
        for object in objects {
            let Some(group) = object.labels().ok().and_then(|mut l| l.remove(GROUP_LABEL)) else {
                continue;
            };
            groups.entry(group).or_default().push(object);
        }
        Ok(groups
            .into_iter()
            .map(|(group, objects)| {
                InstalledPak::from_objects(GroupId::new(group), namespace, &objects)
            })
            .collect())
    }

    /// Installations of `pak` in `namespace`.
    pub fn instances(&self, namespace: &str, pak: &Pak) -> Result<Vec<InstalledPak>, CoreError> {
        Ok(self
            .installed(namespace)?
            .into_iter()
            .filter(|i| i.pak_url == pak.source_url)
            .collect())
    }

    pub fn status(&self, namespace: &str, group: &str) -> Result<InstalledPak, CoreError> {
        let objects = self
            .runner
            .list_by_selector(namespace, &group_selector(group))?;
        if objects.is_empty() {
            return Err(CoreError::GroupNotFound {
                namespace: namespace.to_owned(),
                group: group.to_owned(),
            });
        }
        Ok(InstalledPak::from_objects(
            GroupId::new(group),
            namespace,
            &objects,
        ))
    }

    /// Delete every object of an installation group. Returns the group as it
    /// was before deletion.
    pub fn delete_instance(&self, namespace: &str, group: &str) -> Result<InstalledPak, CoreError> {
        let before = self.status(namespace, group)?;
        self.runner
            .delete_by_selector(namespace, &group_selector(group))?;
        info!(
            "deleted group {group} ({} objects) from {namespace}",
            before.objects.len()
        );
        Ok(before)
    }

    fn roll_back(&self, namespace: &str, group: &str) -> String {
        match self
            .runner
            .delete_by_selector(namespace, &group_selector(group))
        {
            Ok(()) => {
                info!("rolled back group {group} in {namespace}");
                "rolled back".to_owned()
            }
            Err(e) => {
                warn!("rollback of group {group} in {namespace} failed: {e}");
                format!("rollback failed: {e}")
            }
        }
    }
}

fn group_selector(group: &str) -> String {
    format!("{GROUP_LABEL}={group}")
}
