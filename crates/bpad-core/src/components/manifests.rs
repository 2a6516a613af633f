//! Component that applies a directory of kubernetes manifests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::component::{Component, LifecycleContext};
use crate::error::Result;
use crate::kubectl;
use crate::provisioning::TfOutputs;

/// Applies every `*.yml`/`*.yaml` file in its directory on deploy, in file
/// name order, with terraform outputs and earlier exports expanded into the
/// manifest text.
#[derive(Debug, Clone)]
pub struct KubectlManifests {
    path: PathBuf,
}

impl KubectlManifests {
    pub const KIND: &'static str = "kubectl_manifests";

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Manifest files in this component's directory, sorted by name.
    pub fn manifest_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .map(|ext| ext == "yml" || ext == "yaml")
                .unwrap_or(false);
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl Component for KubectlManifests {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn build(&self, _ctx: &mut LifecycleContext<'_>, _force_rebuild: bool) -> Result<()> {
        Ok(())
    }

    async fn package(&self, _ctx: &mut LifecycleContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn deploy(&self, ctx: &mut LifecycleContext<'_>, outputs: &TfOutputs) -> Result<()> {
        ctx.env.set_from_tf_outputs(outputs);
        let files = self.manifest_files()?;
        info!(
            deployment = ctx.deployment,
            path = %self.path.display(),
            count = files.len(),
            "Applying k8s manifests"
        );
        for file in files {
            kubectl::apply_manifest(ctx, &file, true).await?;
        }
        Ok(())
    }

    // Teardown goes through `destroy` of the owning deployment.
    async fn undeploy(&self, _ctx: &mut LifecycleContext<'_>, _outputs: &TfOutputs) -> Result<()> {
        Ok(())
    }
}
