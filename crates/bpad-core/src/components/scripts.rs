//! Component driven by per-phase shell scripts.
//!
//! For a phase `p`, runs `sh p.sh` inside the component directory when that
//! file exists. The script sees the lifecycle context env plus
//! `BPAD_DEPLOYMENT` (and `BPAD_FORCE_REBUILD` during build). Lines of stdout
//! of the form `::export NAME=VALUE` are added to the context env, making the
//! value available to components later in the same call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::component::{Component, LifecycleContext};
use crate::error::Result;
use crate::provisioning::TfOutputs;
use crate::runner::CommandSpec;

const EXPORT_PREFIX: &str = "::export ";

#[derive(Debug, Clone)]
pub struct Scripts {
    path: PathBuf,
}

impl Scripts {
    pub const KIND: &'static str = "scripts";

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn script_for(&self, phase: &str) -> PathBuf {
        self.path.join(format!("{phase}.sh"))
    }

    async fn run_phase(
        &self,
        ctx: &mut LifecycleContext<'_>,
        phase: &str,
        extra: &[(&str, String)],
    ) -> Result<()> {
        let script = self.script_for(phase);
        if !script.is_file() {
            debug!(path = %self.path.display(), phase, "No script for phase, skipping");
            return Ok(());
        }

        info!(deployment = ctx.deployment, script = %script.display(), "Running {phase} script");
        let spec = CommandSpec::new("sh")
            .arg(format!("{phase}.sh"))
            .current_dir(&self.path)
            .envs(ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .envs([("BPAD_DEPLOYMENT", ctx.deployment.to_string())])
            .envs(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let output = ctx.runner.run(&spec).await?;
        for (key, value) in parse_exports(&output.stdout) {
            debug!(key, "Script exported variable");
            ctx.env.set(key, value);
        }
        Ok(())
    }
}

/// Extract `::export NAME=VALUE` lines from script output.
fn parse_exports(stdout: &str) -> Vec<(&str, &str)> {
    stdout
        .lines()
        .filter_map(|line| line.trim_end().strip_prefix(EXPORT_PREFIX))
        .filter_map(|assignment| assignment.split_once('='))
        .map(|(key, value)| (key.trim(), value))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[async_trait]
impl Component for Scripts {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn build(&self, ctx: &mut LifecycleContext<'_>, force_rebuild: bool) -> Result<()> {
        self.run_phase(ctx, "build", &[("BPAD_FORCE_REBUILD", force_rebuild.to_string())])
            .await
    }

    async fn package(&self, ctx: &mut LifecycleContext<'_>) -> Result<()> {
        self.run_phase(ctx, "package", &[]).await
    }

    async fn deploy(&self, ctx: &mut LifecycleContext<'_>, outputs: &TfOutputs) -> Result<()> {
        ctx.env.set_from_tf_outputs(outputs);
        self.run_phase(ctx, "deploy", &[]).await
    }

    async fn undeploy(&self, ctx: &mut LifecycleContext<'_>, outputs: &TfOutputs) -> Result<()> {
        ctx.env.set_from_tf_outputs(outputs);
        self.run_phase(ctx, "undeploy", &[]).await
    }
}
