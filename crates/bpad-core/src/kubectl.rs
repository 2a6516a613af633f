//! kubectl helpers for components that submit cluster manifests.

use std::path::Path;

use tracing::{error, info};

use crate::component::LifecycleContext;
use crate::error::Result;
use crate::runner::{CommandOutput, CommandSpec};

/// Read a manifest from disk, expanding `$NAME`/`${NAME}` references when asked.
pub fn render_manifest(ctx: &LifecycleContext<'_>, yaml_path: &Path, expand: bool) -> Result<String> {
    let text = std::fs::read_to_string(yaml_path)?;
    Ok(if expand { ctx.env.expand(&text) } else { text })
}

/// `kubectl apply -f -` with the manifest at `yaml_path` on stdin.
pub async fn apply_manifest(
    ctx: &LifecycleContext<'_>,
    yaml_path: &Path,
    expand: bool,
) -> Result<CommandOutput> {
    submit(ctx, "apply", yaml_path, expand).await
}

/// `kubectl create -f -` with the manifest at `yaml_path` on stdin.
///
/// Needed instead of apply for resources using `generateName`, such as
/// one-off jobs that ask the cluster to pick a unique name.
pub async fn create_manifest(
    ctx: &LifecycleContext<'_>,
    yaml_path: &Path,
    expand: bool,
) -> Result<CommandOutput> {
    submit(ctx, "create", yaml_path, expand).await
}

/// `kubectl apply -f <url>` for a remote manifest. No expansion is performed.
pub async fn apply_remote(ctx: &LifecycleContext<'_>, url: &str) -> Result<CommandOutput> {
    info!(url, "Applying remote k8s manifest");
    let spec = CommandSpec::new(&ctx.tools.kubectl).args(["apply", "-f", url]);
    ctx.runner.run(&spec).await.map_err(|e| {
        error!(url, error = %e, "kubectl apply of remote manifest failed");
        e
    })
}

async fn submit(
    ctx: &LifecycleContext<'_>,
    verb: &str,
    yaml_path: &Path,
    expand: bool,
) -> Result<CommandOutput> {
    let manifest = render_manifest(ctx, yaml_path, expand)?;
    info!(verb, path = %yaml_path.display(), "Submitting k8s manifest:\n{manifest}");

    let spec = CommandSpec::new(&ctx.tools.kubectl)
        .args([verb, "-f", "-"])
        .stdin(manifest);
    ctx.runner.run(&spec).await.map_err(|e| {
        error!(verb, path = %yaml_path.display(), error = %e, "kubectl {verb} failed");
        e
    })
}
