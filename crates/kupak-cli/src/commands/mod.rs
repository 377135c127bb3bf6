pub mod delete;
pub mod install;
pub mod list;
pub mod paks;
pub mod spec;
pub mod status;

use indicatif::{ProgressBar, ProgressStyle};
use kupak_core::{CoreError, InstallStatus, InstalledPak};
use kupak_schema::{Value, ValueMap};
use std::fmt;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PAK_ERROR: u8 = 2;
pub const EXIT_RUNNER_ERROR: u8 = 3;

/// A failed command: what to print and which exit code to leave with.
#[derive(Debug)]
pub struct Failure {
    pub code: u8,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CoreError> for Failure {
    fn from(err: CoreError) -> Self {
        let code = if err.is_pak_error() {
            EXIT_PAK_ERROR
        } else if err.is_runner_error() {
            EXIT_RUNNER_ERROR
        } else {
            EXIT_FAILURE
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self {
            code: EXIT_FAILURE,
            message,
        }
    }
}

pub type CmdResult = Result<u8, Failure>;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Run `work` behind a spinner unless JSON output is requested.
pub fn with_spinner<T, E: Into<Failure>>(
    json: bool,
    msg: &str,
    done: &str,
    work: impl FnOnce() -> Result<T, E>,
) -> Result<T, Failure> {
    if json {
        return work().map_err(Into::into);
    }
    let pb = spinner(msg);
    match work() {
        Ok(value) => {
            spin_ok(&pb, done);
            Ok(value)
        }
        Err(e) => {
            spin_fail(&pb, msg);
            Err(e.into())
        }
    }
}

pub fn colorize_status(status: InstallStatus) -> String {
    use console::Style;
    let text = status.to_string();
    match status {
        InstallStatus::Running => Style::new().green().apply_to(text).to_string(),
        InstallStatus::Deleting => Style::new().yellow().apply_to(text).to_string(),
        InstallStatus::Error => Style::new().red().bold().apply_to(text).to_string(),
    }
}

/// Parse repeated `--set key=value` flags. Values stay strings; the pak's
/// property types coerce them during normalization.
pub fn parse_set(pairs: &[String]) -> Result<ValueMap, String> {
    let mut values = ValueMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                values.insert(key.trim().to_owned(), Value::from(value));
            }
            _ => return Err(format!("invalid --set '{pair}': expected KEY=VALUE")),
        }
    }
    Ok(values)
}

/// Human-readable block for one installation group.
pub fn print_installed(installed: &InstalledPak) {
    println!("Pak URL: {}", installed.pak_url);
    println!("Group:   {}", installed.group);
    println!("Status:  {}", colorize_status(installed.status));
    if !installed.properties.is_empty() {
        println!("Values:");
        for (name, value) in &installed.properties {
            println!("  {name} = {}", value.as_text());
        }
    }
    for object in &installed.objects {
        println!("  ({}) {}", object.kind, object.name);
        if let Some(pod) = &object.pod {
            if !pod.phase.is_empty() {
                println!("      State:   {}", pod.phase);
            }
            if !pod.pod_ip.is_empty() {
                println!("      Pod IP:  {}", pod.pod_ip);
            }
            if !pod.reason.is_empty() {
                println!("      Reason:  {}", pod.reason);
            }
            if !pod.message.is_empty() {
                println!("      Message: {}", pod.message);
            }
        }
    }
}
