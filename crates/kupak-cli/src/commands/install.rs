use super::{json_pretty, parse_set, with_spinner, CmdResult, Failure, EXIT_SUCCESS};
use kupak_core::{CoreError, LabeledPak, Manager, PodTemplatePolicy, UuidGroupIds};
use kupak_schema::{parse_values_str, GroupId, ValueMap};
use serde::Serialize;
use std::io::{IsTerminal, Read};
use std::path::Path;
use tracing::debug;

pub struct InstallArgs<'a> {
    pub pak: &'a str,
    pub namespace: &'a str,
    pub values: Option<&'a Path>,
    pub set: &'a [String],
    pub dry_run: bool,
    pub strict_templates: bool,
}

#[derive(Serialize)]
struct DryRunView<'a> {
    group: &'a GroupId,
    manifests: Vec<ManifestView<'a>>,
}

#[derive(Serialize)]
struct ManifestView<'a> {
    resource: &'a str,
    manifest: String,
}

pub fn run(manager: Manager, args: &InstallArgs<'_>, json: bool) -> CmdResult {
    let policy = if args.strict_templates {
        PodTemplatePolicy::Strict
    } else {
        PodTemplatePolicy::Lenient
    };
    let manager = manager.with_pod_template_policy(policy);
    let values = collect_values(args.values, args.set)?;

    let pak = with_spinner(json, &format!("loading {}...", args.pak), "pak loaded", || {
        manager.load(args.pak)
    })?;

    if args.dry_run {
        let labeled = manager.render_labeled(&pak, &values, &UuidGroupIds)?;
        print_dry_run(&labeled, json)?;
        return Ok(EXIT_SUCCESS);
    }

    let report = with_spinner(
        json,
        &format!("installing {} into {}...", pak.name(), args.namespace),
        &format!("installed {} {}", pak.name(), pak.version()),
        || manager.install(&pak, args.namespace, &values, &UuidGroupIds),
    )?;

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!("group:     {}", report.group);
        println!("namespace: {}", report.namespace);
        println!("pak:       {} {}", report.pak_name, report.pak_version);
        println!("source:    {}", report.pak_url);
        for object in &report.objects {
            println!("created ({}) {}", object.kind, object.name);
        }
    }
    Ok(EXIT_SUCCESS)
}

/// Values file (or piped stdin), then `--set` pairs on top.
fn collect_values(file: Option<&Path>, set: &[String]) -> Result<ValueMap, Failure> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read values file {}: {e}", path.display()))?,
        None if !std::io::stdin().is_terminal() => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read values from stdin: {e}"))?;
            buf
        }
        None => String::new(),
    };

    let mut values = parse_values_str(&text).map_err(CoreError::Value)?;
    let overrides = parse_set(set)?;
    debug!(
        "{} values from input, {} from --set",
        values.len(),
        overrides.len()
    );
    values.extend(overrides);
    Ok(values)
}

fn print_dry_run(labeled: &LabeledPak, json: bool) -> Result<(), String> {
    if json {
        let view = DryRunView {
            group: &labeled.group,
            manifests: labeled
                .manifests
                .iter()
                .map(|m| ManifestView {
                    resource: &m.resource,
                    manifest: String::from_utf8_lossy(&m.bytes).into_owned(),
                })
                .collect(),
        };
        println!("{}", json_pretty(&view)?);
        return Ok(());
    }
    for manifest in &labeled.manifests {
        println!("---");
        println!("# Source: {}", manifest.resource);
        print!("{}", String::from_utf8_lossy(&manifest.bytes));
    }
    Ok(())
}
