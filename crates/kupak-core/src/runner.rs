use crate::object::RenderedObject;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Kinds queried and deleted when looking up installed objects by label.
pub const TRACKED_KINDS: &str = "pods,services,replicationcontrollers,deployments,replicasets,\
statefulsets,daemonsets,jobs,cronjobs,configmaps,secrets,ingresses,persistentvolumeclaims";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("runner I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode runner output: {0}")]
    Decode(String),
    #[error("runner state error: {0}")]
    State(String),
    #[error("'{0}' is not available")]
    Unavailable(String),
}

/// The cluster side of kupak: creates rendered objects and finds or deletes
/// them again by label selector.
pub trait Runner: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn create(&self, namespace: &str, manifest: &[u8]) -> Result<(), RunnerError>;

    fn list_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RenderedObject>, RunnerError>;

    fn delete_by_selector(&self, namespace: &str, selector: &str) -> Result<(), RunnerError>;
}

impl<R: Runner + ?Sized> Runner for Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn create(&self, namespace: &str, manifest: &[u8]) -> Result<(), RunnerError> {
        (**self).create(namespace, manifest)
    }

    fn list_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RenderedObject>, RunnerError> {
        (**self).list_by_selector(namespace, selector)
    }

    fn delete_by_selector(&self, namespace: &str, selector: &str) -> Result<(), RunnerError> {
        (**self).delete_by_selector(namespace, selector)
    }
}

/// Drives a `kubectl` binary as a child process.
pub struct KubectlRunner {
    program: String,
}

impl Default for KubectlRunner {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlRunner {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
        }
    }

    fn args(namespace: &str, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["--namespace".to_owned(), namespace.to_owned()];
        args.extend(rest.iter().map(|s| (*s).to_owned()));
        args
    }

    fn create_args(namespace: &str) -> Vec<String> {
        Self::args(namespace, &["create", "-f", "-"])
    }

    fn get_args(namespace: &str, selector: &str) -> Vec<String> {
        Self::args(namespace, &["get", TRACKED_KINDS, "-l", selector, "-o", "yaml"])
    }

    fn delete_args(namespace: &str, selector: &str) -> Vec<String> {
        Self::args(namespace, &["delete", TRACKED_KINDS, "-l", selector])
    }

    fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<Vec<u8>, RunnerError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("exec: {command}");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let written = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input),
            _ => Ok(()),
        };

        // stdin is closed by now; always reap the child, even after a failed write
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(RunnerError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        written?;
        Ok(output.stdout)
    }
}

impl Runner for KubectlRunner {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .args(["version", "--client"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn create(&self, namespace: &str, manifest: &[u8]) -> Result<(), RunnerError> {
        self.run(&Self::create_args(namespace), Some(manifest))?;
        Ok(())
    }

    fn list_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RenderedObject>, RunnerError> {
        let stdout = self.run(&Self::get_args(namespace, selector), None)?;
        parse_list(&stdout)
    }

    fn delete_by_selector(&self, namespace: &str, selector: &str) -> Result<(), RunnerError> {
        self.run(&Self::delete_args(namespace, selector), None)?;
        Ok(())
    }
}

/// Decode the `items` of a `kind: List` document. Empty output means no objects.
pub fn parse_list(data: &[u8]) -> Result<Vec<RenderedObject>, RunnerError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let doc: serde_yaml::Value =
        serde_yaml::from_slice(data).map_err(|e| RunnerError::Decode(e.to_string()))?;
    let items = match doc.get("items") {
        None | Some(serde_yaml::Value::Null) => return Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(items)) => items.clone(),
        Some(_) => return Err(RunnerError::Decode("'items' is not a list".to_owned())),
    };
    items
        .into_iter()
        .map(|item| {
            RenderedObject::from_value(item).map_err(|e| RunnerError::Decode(e.to_string()))
        })
        .collect()
}

/// Whether `labels` satisfy a selector made of comma-separated `key` and
/// `key=value` terms.
pub fn selector_matches(selector: &str, labels: &crate::object::Labels) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key.trim()).is_some_and(|v| v == value.trim()),
            None => labels.contains_key(term),
        })
}
