use crate::RemoteError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_KUBECTL: &str = "kubectl";

/// Persistent client settings. Command-line flags and environment variables
/// take precedence over what is stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the repository index used to resolve bare pak names.
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_kubectl() -> String {
    DEFAULT_KUBECTL.to_owned()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            repo: None,
            namespace: default_namespace(),
            kubectl: default_kubectl(),
        }
    }
}

impl ClientConfig {
    /// Load `~/.config/kupak/config.json`, or `$KUPAK_CONFIG` when set.
    /// A missing file yields the defaults.
    pub fn load_default() -> Result<Self, RemoteError> {
        let path = default_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            RemoteError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Layer explicitly given settings over the stored ones.
    #[must_use]
    pub fn with_overrides(
        mut self,
        repo: Option<String>,
        namespace: Option<String>,
        kubectl: Option<String>,
    ) -> Self {
        if repo.is_some() {
            self.repo = repo;
        }
        if let Some(ns) = namespace {
            self.namespace = ns;
        }
        if let Some(bin) = kubectl {
            self.kubectl = bin;
        }
        self
    }
}

pub fn default_config_path() -> Result<PathBuf, RemoteError> {
    if let Ok(explicit) = std::env::var("KUPAK_CONFIG") {
        return Ok(PathBuf::from(explicit));
    }
    let home = std::env::var("HOME").map_err(|_| RemoteError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/kupak/config.json"))
}
