//! Deployment manifest loading.
//!
//! The manifest (`deployments.yml` by default) is a YAML sequence of tagged
//! records:
//!
//! ```yaml
//! - !Deployment
//!   name: dev
//!   path: infra/dev
//!   apply_wait: 30
//!   components:
//!     - !Component
//!       class_name: scripts
//!       path: services/api
//!     - !Component
//!       class_name: kubectl_manifests
//!       path: k8s/api
//! ```
//!
//! `class_name` is looked up in a [`ComponentRegistry`]. A relative deployment
//! path is resolved against the configured base directory; component paths
//! are used exactly as written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::deployment::{Deployment, APPLY_WAIT_DEFAULT};
use crate::error::{BpadError, Result};
use crate::registry::ComponentRegistry;
use crate::runner::CommandRunner;

/// Top-level manifest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManifestRecord {
    Deployment(DeploymentRecord),
}

/// Declarative form of a [`Deployment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    #[serde(default = "default_apply_wait")]
    pub apply_wait: u64,
}

fn default_apply_wait() -> u64 {
    APPLY_WAIT_DEFAULT
}

/// Component entry inside a deployment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentRecord {
    Component(ComponentDefinition),
}

/// Pairing of a registered component type with its directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub class_name: String,
    pub path: PathBuf,
}

/// Parse manifest text into records without instantiating anything.
pub fn parse_manifest(text: &str) -> std::result::Result<Vec<ManifestRecord>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(text)
}

/// Loaded deployments keyed by name.
#[derive(Debug, Default)]
pub struct Deployments {
    by_name: BTreeMap<String, Deployment>,
}

impl Deployments {
    /// Insert a deployment, replacing any earlier one with the same name.
    pub fn insert(&mut self, deployment: Deployment) {
        let name = deployment.name().to_string();
        if self.by_name.insert(name.clone(), deployment).is_some() {
            warn!(deployment = %name, "Duplicate deployment name in manifest; later entry wins");
        }
    }

    /// Look up a deployment, listing every valid name when it is absent.
    pub fn get(&self, name: &str) -> Result<&Deployment> {
        self.by_name
            .get(name)
            .ok_or_else(|| BpadError::UnknownDeployment {
                name: name.to_string(),
                valid: self.names(),
            })
    }

    /// Deployment names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Turns a manifest into [`Deployments`] with concrete components.
pub struct ManifestLoader<'a> {
    registry: &'a ComponentRegistry,
    settings: &'a Settings,
}

impl<'a> ManifestLoader<'a> {
    pub fn new(registry: &'a ComponentRegistry, settings: &'a Settings) -> Self {
        Self { registry, settings }
    }

    /// Read and instantiate the manifest named in the settings.
    pub fn load(&self, runner: Arc<dyn CommandRunner>) -> Result<Deployments> {
        let path = &self.settings.manifest;
        debug!(manifest = %path.display(), "Loading deployments");
        let text = std::fs::read_to_string(path).map_err(|source| BpadError::ManifestNotFound {
            path: path.clone(),
            source,
        })?;
        self.load_str(&text, path, runner)
    }

    /// Instantiate manifest text. `origin` is used in error messages only.
    pub fn load_str(
        &self,
        text: &str,
        origin: &Path,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Deployments> {
        let records = parse_manifest(text).map_err(|source| BpadError::ManifestParse {
            path: origin.to_path_buf(),
            source,
        })?;

        let mut deployments = Deployments::default();
        for ManifestRecord::Deployment(record) in records {
            deployments.insert(self.instantiate(record, runner.clone())?);
        }
        debug!(count = deployments.len(), "Loaded deployments");
        Ok(deployments)
    }

    fn instantiate(&self, record: DeploymentRecord, runner: Arc<dyn CommandRunner>) -> Result<Deployment> {
        let components = record
            .components
            .into_iter()
            .map(|ComponentRecord::Component(def)| self.registry.create(&def.class_name, def.path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Deployment::new(
            record.name,
            self.settings.resolve(&record.path),
            components,
            runner,
            self.settings.tools.clone(),
        )
        .with_apply_wait(record.apply_wait))
    }
}
