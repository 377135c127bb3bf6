use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const PAK: &str = r"
name: nginx
version: 1.0.0
description: web server
tags: [web]
properties:
  - name: replicas
    type: int
    default: 1
    description: number of pods
  - name: tls
    type: bool
    default: no
resources:
  - rc.yaml
  - svc.yaml
";

const RC: &str = r"apiVersion: v1
kind: ReplicationController
metadata:
  name: nginx
  labels:
    app: demo
spec:
  replicas: $(replicas)
  template:
    metadata:
      labels:
        app: demo
    spec:
      containers:
        - name: nginx
          image: nginx
";

const SVC: &str = r"apiVersion: v1
kind: Service
metadata:
  name: nginx
spec:
  ports:
    - port: $(if tls)443$(else)80$(end)
";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pak = dir.path().join("nginx");
        fs::create_dir_all(&pak).unwrap();
        fs::write(pak.join("pak.yaml"), PAK).unwrap();
        fs::write(pak.join("rc.yaml"), RC).unwrap();
        fs::write(pak.join("svc.yaml"), SVC).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn pak(&self) -> String {
        self.path().join("nginx/pak.yaml").to_string_lossy().to_string()
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn kupak(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_kupak"))
            .args(args)
            .env("KUPAK_CONFIG", self.path().join("config.json"))
            .env_remove("KUPAK_REPO")
            .env_remove("KUPAK_NAMESPACE")
            .env_remove("KUPAK_LOG")
            .env("KUPAK_KUBECTL", "/nonexistent/kubectl-for-tests")
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn cli_version_flag() {
    let fx = Fixture::new();
    let output = fx.kupak(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("kupak"));
}

#[test]
fn cli_help_lists_commands() {
    let fx = Fixture::new();
    let output = fx.kupak(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["paks", "spec", "install", "list", "status", "delete"] {
        assert!(text.contains(command), "missing {command} in:\n{text}");
    }
}

#[test]
fn cli_spec_of_local_pak() {
    let fx = Fixture::new();
    let output = fx.kupak(&["spec", &fx.pak()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("nginx"));
    assert!(text.contains("replicas"));
    assert!(text.contains("number of pods"));
    assert!(text.contains("svc.yaml"));
}

#[test]
fn cli_spec_json() {
    let fx = Fixture::new();
    let output = fx.kupak(&["--json", "spec", &fx.pak()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "nginx");
    assert_eq!(json["version"], "1.0.0");
    assert_eq!(json["source_url"], fx.pak());
    assert_eq!(json["properties"][0]["type"], "int");
    assert_eq!(json["pak_id"].as_str().unwrap().len(), 64);
}

#[test]
fn cli_install_dry_run_renders_labeled_manifests() {
    let fx = Fixture::new();
    let values = fx.write("values.yaml", "replicas: 2\ntls: yes\n");
    let output = fx.kupak(&[
        "install",
        &fx.pak(),
        &values.to_string_lossy(),
        "--set",
        "replicas=4",
        "--dry-run",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("replicas: 4"), "{text}");
    assert!(text.contains("port: 443"), "{text}");
    assert!(text.contains("pak-group:"), "{text}");
    assert!(text.contains("pak-source-url:"), "{text}");
    assert!(text.contains("app: demo"), "{text}");
}

#[test]
fn cli_install_dry_run_json_has_one_group() {
    let fx = Fixture::new();
    let output = fx.kupak(&["--json", "install", &fx.pak(), "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let group = json["group"].as_str().unwrap().to_owned();
    let manifests = json["manifests"].as_array().unwrap();
    assert_eq!(manifests.len(), 2);
    for manifest in manifests {
        let body = manifest["manifest"].as_str().unwrap();
        assert!(body.contains(&group), "{body}");
    }
}

#[test]
fn cli_schema_error_exits_with_pak_error() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.path().join("broken")).unwrap();
    let pak = fx.path().join("broken/pak.yaml");
    fs::write(
        &pak,
        "name: broken\nproperties:\n  - {name: x, type: int}\n  - {name: x, type: int}\n",
    )
    .unwrap();
    let output = fx.kupak(&["spec", &pak.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("duplicated property 'x'"));
}

#[test]
fn cli_bad_value_exits_with_pak_error() {
    let fx = Fixture::new();
    let output = fx.kupak(&["install", &fx.pak(), "--set", "tls=perhaps", "--dry-run"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("invalid values:"));
}

#[test]
fn cli_paks_from_local_index() {
    let fx = Fixture::new();
    let index = fx.write(
        "index.yaml",
        "paks:\n  - name: nginx\n    version: 1.0.0\n    url: nginx/pak.yaml\n    tags: [web]\n",
    );
    let repo = index.to_string_lossy().to_string();

    let output = fx.kupak(&["--repo", &repo, "paks"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("nginx"));

    let output = fx.kupak(&["--repo", &repo, "--json", "spec", "nginx@1.0.0"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["source_url"], fx.pak());
}

#[test]
fn cli_bare_name_without_repo_fails() {
    let fx = Fixture::new();
    let output = fx.kupak(&["spec", "nginx"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no repository configured"));
}

#[test]
fn cli_invalid_set_fails() {
    let fx = Fixture::new();
    let output = fx.kupak(&["install", &fx.pak(), "--set", "replicas", "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("expected KEY=VALUE"));
}

#[test]
fn cli_repo_from_config_file() {
    let fx = Fixture::new();
    let index = fx.write(
        "index.yaml",
        "paks:\n  - name: nginx\n    version: 1.0.0\n    url: nginx/pak.yaml\n",
    );
    let config = serde_json::json!({ "repo": index.to_string_lossy() });
    fx.write("config.json", &config.to_string());

    let output = fx.kupak(&["spec", "nginx"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("web server"));
}

#[test]
fn cli_list_without_kubectl_is_runner_error() {
    let fx = Fixture::new();
    let output = fx.kupak(&["list"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).starts_with("error: runner error:"));
}

#[test]
fn cli_install_without_kubectl_fails_before_creating() {
    let fx = Fixture::new();
    let output = fx.kupak(&["install", &fx.pak()]);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr(&output);
    assert!(err.contains("'/nonexistent/kubectl-for-tests' is not available"), "{err}");
}

#[test]
fn cli_dry_run_skips_disabled_resources() {
    let fx = Fixture::new();
    fs::write(
        fx.path().join("nginx/pak.yaml"),
        format!("{PAK}  - ingress.yaml\n"),
    )
    .unwrap();
    fs::write(
        fx.path().join("nginx/ingress.yaml"),
        "$(if tls)\napiVersion: networking.k8s.io/v1\nkind: Ingress\nmetadata:\n  name: nginx\n$(end)\n",
    )
    .unwrap();

    let output = fx.kupak(&["--json", "install", &fx.pak(), "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["manifests"].as_array().unwrap().len(), 2);

    let output = fx.kupak(&["--json", "install", &fx.pak(), "--set", "tls=yes", "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let manifests = json["manifests"].as_array().unwrap();
    assert_eq!(manifests.len(), 3);
    assert!(manifests[2]["manifest"].as_str().unwrap().contains("pak-values"));
}
