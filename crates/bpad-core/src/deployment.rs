//! Deployment lifecycle dispatch.
//!
//! A deployment pairs one terraform root directory with an ordered list of
//! components. Infrastructure verbs (`apply`, `destroy`) go straight to
//! terraform; software verbs (`build`, `package`, `deploy`, `undeploy`) walk
//! the components in declared order and stop at the first failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::component::{Component, LifecycleContext};
use crate::config::Tools;
use crate::error::{BpadError, Result};
use crate::provisioning::{parse_outputs, Terraform, TfOutputs};
use crate::runner::CommandRunner;

/// Default pause (seconds) between `apply` and component deployment.
pub const APPLY_WAIT_DEFAULT: u64 = 60;

pub struct Deployment {
    name: String,
    path: PathBuf,
    components: Vec<Box<dyn Component>>,
    apply_wait: u64,
    runner: Arc<dyn CommandRunner>,
    tools: Tools,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("components", &self.components)
            .field("apply_wait", &self.apply_wait)
            .finish()
    }
}

impl Deployment {
    /// Create a deployment. `components` run in the order given.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        components: Vec<Box<dyn Component>>,
        runner: Arc<dyn CommandRunner>,
        tools: Tools,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            components,
            apply_wait: APPLY_WAIT_DEFAULT,
            runner,
            tools,
        }
    }

    pub fn with_apply_wait(mut self, seconds: u64) -> Self {
        self.apply_wait = seconds;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terraform root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn components(&self) -> &[Box<dyn Component>] {
        &self.components
    }

    /// Declared wait after infrastructure is applied. Not enforced by any
    /// lifecycle method.
    pub fn apply_wait(&self) -> Duration {
        Duration::from_secs(self.apply_wait)
    }

    fn terraform(&self) -> Terraform<'_> {
        Terraform::new(self.runner.as_ref(), &self.tools.terraform, &self.path)
    }

    fn context(&self) -> LifecycleContext<'_> {
        LifecycleContext::new(&self.name, self.runner.as_ref(), &self.tools)
    }

    /// Confirm the deployment directory and every component directory exist.
    pub fn check_paths(&self) -> Result<()> {
        let paths = std::iter::once(self.path.as_path())
            .chain(self.components.iter().map(|c| c.path()));
        for path in paths {
            if !path.is_dir() {
                return Err(BpadError::PathNotFound {
                    deployment: self.name.clone(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Current terraform outputs.
    ///
    /// Queried on every call: infrastructure may have changed since the last
    /// look, e.g. through an `apply` in between.
    pub async fn tf_outputs(&self) -> Result<TfOutputs> {
        let fail = |reason: String| {
            error!(
                deployment = %self.name,
                path = %self.path.display(),
                "Error reading terraform outputs: {reason}"
            );
            BpadError::ProvisioningOutputs {
                deployment: self.name.clone(),
                path: self.path.clone(),
                reason,
            }
        };

        let output = self
            .terraform()
            .output_json()
            .await
            .map_err(|e| fail(e.to_string()))?;
        parse_outputs(&output.stdout).map_err(|e| fail(e.to_string()))
    }

    /// Stand up infrastructure with `terraform apply`.
    pub async fn apply(&self, auto_approve: bool) -> Result<()> {
        info!(deployment = %self.name, "Applying terraform configuration");
        self.terraform().apply(auto_approve).await.map_err(|e| {
            error!(
                deployment = %self.name,
                path = %self.path.display(),
                "Error applying terraform config: {e}"
            );
            e
        })?;
        Ok(())
    }

    /// Tear down infrastructure with `terraform destroy`.
    pub async fn destroy(&self, auto_approve: bool) -> Result<()> {
        info!(deployment = %self.name, "Destroying terraform-managed infrastructure");
        self.terraform().destroy(auto_approve).await.map_err(|e| {
            error!(
                deployment = %self.name,
                path = %self.path.display(),
                "Error destroying terraform config: {e}"
            );
            e
        })?;
        Ok(())
    }

    /// Create the remote state backend. Not supported.
    pub async fn bootstrap(&self) -> Result<()> {
        Err(BpadError::Unsupported("bootstrap"))
    }

    /// Remove the remote state backend. Not supported.
    pub async fn unbootstrap(&self) -> Result<()> {
        Err(BpadError::Unsupported("unbootstrap"))
    }

    /// Build every component. `force_rebuild` bypasses cached artifacts.
    pub async fn build(&self, force_rebuild: bool) -> Result<()> {
        info!(deployment = %self.name, force_rebuild, "Building system components");
        let mut ctx = self.context();
        for component in &self.components {
            component.build(&mut ctx, force_rebuild).await?;
        }
        Ok(())
    }

    /// Package every component's artifacts.
    pub async fn package(&self) -> Result<()> {
        info!(deployment = %self.name, "Packaging system components");
        let mut ctx = self.context();
        for component in &self.components {
            component.package(&mut ctx).await?;
        }
        Ok(())
    }

    /// Deploy component software. Outputs are read once for the whole call.
    pub async fn deploy(&self) -> Result<()> {
        info!(deployment = %self.name, "Deploying system components");
        let outputs = self.tf_outputs().await?;
        let mut ctx = self.context();
        for component in &self.components {
            component.deploy(&mut ctx, &outputs).await?;
        }
        Ok(())
    }

    /// Undeploy component software. Outputs are read once for the whole call.
    pub async fn undeploy(&self) -> Result<()> {
        info!(deployment = %self.name, "Un-deploying system components");
        let outputs = self.tf_outputs().await?;
        let mut ctx = self.context();
        for component in &self.components {
            component.undeploy(&mut ctx, &outputs).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Noop;
    use crate::fakes::ScriptedRunner;

    fn deployment(path: &Path, components: Vec<Box<dyn Component>>) -> (Deployment, Arc<ScriptedRunner>) {
        let runner = Arc::new(ScriptedRunner::new());
        let dep = Deployment::new("dev", path, components, runner.clone(), Tools::default());
        (dep, runner)
    }

    #[test]
    fn check_paths_accepts_existing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let comp_dir = dir.path().join("api");
        std::fs::create_dir(&comp_dir).unwrap();
        let (dep, _) = deployment(dir.path(), vec![Box::new(Noop::new(comp_dir))]);
        assert!(dep.check_paths().is_ok());
    }

    #[test]
    fn check_paths_rejects_missing_component_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let (dep, _) = deployment(dir.path(), vec![Box::new(Noop::new(missing.clone()))]);
        match dep.check_paths() {
            Err(BpadError::PathNotFound { deployment, path }) => {
                assert_eq!(deployment, "dev");
                assert_eq!(path, missing);
            }
            other => panic!("expected PathNotFound, got {other:?}"),
        }
    }

    #[test]
    fn check_paths_rejects_file_as_deployment_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.tf");
        std::fs::write(&file, "").unwrap();
        let (dep, _) = deployment(&file, vec![]);
        assert!(matches!(dep.check_paths(), Err(BpadError::PathNotFound { .. })));
    }

    #[test]
    fn apply_wait_defaults_to_sixty_seconds() {
        let (dep, _) = deployment(Path::new("."), vec![]);
        assert_eq!(dep.apply_wait(), Duration::from_secs(60));
        assert_eq!(dep.with_apply_wait(5).apply_wait(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn bootstrap_and_unbootstrap_are_unsupported() {
        let (dep, runner) = deployment(Path::new("."), vec![]);
        assert!(matches!(dep.bootstrap().await, Err(BpadError::Unsupported("bootstrap"))));
        assert!(matches!(dep.unbootstrap().await, Err(BpadError::Unsupported("unbootstrap"))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn tf_outputs_wraps_unparseable_output() {
        let runner = Arc::new(ScriptedRunner::new().respond("terraform output", "not json"));
        let dep = Deployment::new("dev", "/srv/infra", vec![], runner, Tools::default());

        match dep.tf_outputs().await {
            Err(BpadError::ProvisioningOutputs { deployment, path, .. }) => {
                assert_eq!(deployment, "dev");
                assert_eq!(path, PathBuf::from("/srv/infra"));
            }
            other => panic!("expected ProvisioningOutputs, got {other:?}"),
        }
    }
}
