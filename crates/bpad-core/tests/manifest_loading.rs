//! Loading a manifest from disk and validating it against the filesystem.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bpad_core::{
    BpadError, CommandRunner, ComponentRegistry, ManifestLoader, ProcessRunner, Settings,
};

const MANIFEST: &str = r#"
- !Deployment
  name: staging
  path: terraform/staging
  apply_wait: 15
  components:
    - !Component
      class_name: kubectl_manifests
      path: k8s
    - !Component
      class_name: scripts
      path: services/web
"#;

fn runner() -> Arc<dyn CommandRunner> {
    Arc::new(ProcessRunner::new())
}

#[test]
fn loads_from_disk_with_base_dir() {
    let project = tempfile::tempdir().unwrap();
    for dir in ["terraform/staging", "k8s", "services/web"] {
        fs::create_dir_all(project.path().join(dir)).unwrap();
    }
    let manifest_dir = tempfile::tempdir().unwrap();
    let manifest = manifest_dir.path().join("deployments.yml");
    fs::write(&manifest, MANIFEST).unwrap();

    let registry = ComponentRegistry::with_builtins();
    let settings = Settings::default()
        .with_manifest(&manifest)
        .with_base_dir(Some(project.path().to_path_buf()));
    let deployments = ManifestLoader::new(&registry, &settings)
        .load(runner())
        .unwrap();

    let staging = deployments.get("staging").unwrap();
    assert_eq!(staging.path(), project.path().join("terraform/staging"));
    assert_eq!(staging.apply_wait().as_secs(), 15);
    assert_eq!(staging.components()[0].path(), Path::new("k8s"));
    assert_eq!(staging.components()[1].path(), Path::new("services/web"));
}

#[test]
fn absolute_component_paths_pass_path_checks_under_base() {
    let project = tempfile::tempdir().unwrap();
    let web = project.path().join("services/web");
    fs::create_dir_all(project.path().join("terraform/staging")).unwrap();
    fs::create_dir_all(&web).unwrap();
    let text = format!(
        "- !Deployment\n  name: staging\n  path: terraform/staging\n  components:\n    - !Component\n      class_name: scripts\n      path: {}\n",
        web.display()
    );

    let registry = ComponentRegistry::with_builtins();
    let settings = Settings::default().with_base_dir(Some(project.path().to_path_buf()));
    let deployments = ManifestLoader::new(&registry, &settings)
        .load_str(&text, Path::new("inline"), runner())
        .unwrap();

    let staging = deployments.get("staging").unwrap();
    assert_eq!(staging.components()[0].path(), web);
    staging.check_paths().unwrap();
}

#[test]
fn component_paths_are_not_prefixed_by_base() {
    let project = tempfile::tempdir().unwrap();
    fs::create_dir_all(project.path().join("terraform/staging")).unwrap();
    fs::create_dir_all(project.path().join("k8s")).unwrap();
    fs::write(project.path().join("deployments.yml"), MANIFEST).unwrap();

    let registry = ComponentRegistry::with_builtins();
    let settings = Settings::default()
        .with_manifest(project.path().join("deployments.yml"))
        .with_base_dir(Some(project.path().to_path_buf()));
    let deployments = ManifestLoader::new(&registry, &settings)
        .load(runner())
        .unwrap();

    // `k8s` exists under the base directory but not under the working
    // directory the tests run from.
    match deployments.get("staging").unwrap().check_paths() {
        Err(BpadError::PathNotFound { deployment, path }) => {
            assert_eq!(deployment, "staging");
            assert_eq!(path, Path::new("k8s"));
        }
        other => panic!("expected PathNotFound, got {other:?}"),
    }
}

#[test]
fn empty_base_dir_leaves_paths_relative() {
    let registry = ComponentRegistry::with_builtins();
    let settings = Settings::default().with_base_dir(Some("".into()));
    let deployments = ManifestLoader::new(&registry, &settings)
        .load_str(MANIFEST, Path::new("inline"), runner())
        .unwrap();

    assert_eq!(
        deployments.get("staging").unwrap().path(),
        Path::new("terraform/staging")
    );
}

#[test]
fn unknown_deployment_error_names_the_alternatives() {
    let registry = ComponentRegistry::with_builtins();
    let settings = Settings::default();
    let deployments = ManifestLoader::new(&registry, &settings)
        .load_str(MANIFEST, Path::new("inline"), runner())
        .unwrap();

    let err = deployments.get("production").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid deployment specified: production\n    Supported values: staging"
    );
}
