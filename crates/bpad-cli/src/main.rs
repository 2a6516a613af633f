//! bpad - Build, Package, Apply, Deploy
//!
//! The `bpad` command drives one named deployment from `deployments.yml`
//! through its lifecycle.
//!
//! ## Commands
//!
//! - `apply` / `destroy`: stand up or tear down infrastructure with terraform
//! - `build` / `package`: prepare component artifacts
//! - `deploy` / `undeploy`: push component software onto the infrastructure
//! - `aws-mfa-login`: store temporary AWS credentials for a deployment

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use bpad_core::{
    init_tracing, CommandRunner, ComponentRegistry, Deployment, ManifestLoader, MfaLogin,
    ProcessRunner, Settings, Tools,
};

#[derive(Parser)]
#[command(name = "bpad")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build, deploy, and manage cloud app infrastructure and software", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Deployments manifest
    #[arg(long, global = true, env = "BPAD_MANIFEST", default_value = bpad_core::DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// Base directory for relative paths in the manifest
    #[arg(long, global = true, env = "BPAD_TARGET")]
    target: Option<PathBuf>,

    /// terraform executable
    #[arg(long, global = true, env = "BPAD_TERRAFORM", default_value = "terraform")]
    terraform: String,

    /// kubectl executable
    #[arg(long, global = true, env = "BPAD_KUBECTL", default_value = "kubectl")]
    kubectl: String,

    /// aws executable
    #[arg(long, global = true, env = "BPAD_AWS", default_value = "aws")]
    aws: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply deployment configuration and stand up infrastructure with terraform
    Apply {
        deployment: String,

        /// Skip terraform's interactive approval
        #[arg(long)]
        auto_approve: bool,
    },

    /// Create the deployment's terraform backend (not supported yet)
    Bootstrap { deployment: String },

    /// Build component artifacts
    Build {
        deployment: String,

        /// Rebuild artifacts that already exist on disk
        #[arg(long)]
        nocache: bool,
    },

    /// Deploy component software to the deployment's infrastructure
    Deploy { deployment: String },

    /// Destroy the deployment's cloud resources with terraform
    Destroy {
        deployment: String,

        /// Skip terraform's interactive approval
        #[arg(long)]
        auto_approve: bool,
    },

    /// Package component artifacts for deployment
    Package { deployment: String },

    /// Remove the deployment's terraform backend (not supported yet)
    Unbootstrap { deployment: String },

    /// Undo the changes made by `deploy`
    Undeploy { deployment: String },

    /// Store temporary AWS credentials obtained with an MFA token
    ///
    /// Long-lived keys are read from the `<deployment>-auth` profile; the
    /// session credentials are written to the `<deployment>` profile.
    #[command(alias = "aws_mfa_login")]
    AwsMfaLogin {
        deployment: String,

        /// Current code from the MFA device
        token: String,

        /// ARN of the MFA device
        #[arg(long, env = "MFA_DEVICE_ARN", hide_env_values = true)]
        device_arn: Option<String>,
    },
}

impl Commands {
    fn deployment(&self) -> &str {
        match self {
            Commands::Apply { deployment, .. }
            | Commands::Bootstrap { deployment }
            | Commands::Build { deployment, .. }
            | Commands::Deploy { deployment }
            | Commands::Destroy { deployment, .. }
            | Commands::Package { deployment }
            | Commands::Unbootstrap { deployment }
            | Commands::Undeploy { deployment }
            | Commands::AwsMfaLogin { deployment, .. } => deployment,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::default()
        .with_manifest(cli.manifest)
        .with_base_dir(cli.target)
        .with_tools(Tools {
            terraform: cli.terraform,
            kubectl: cli.kubectl,
            aws: cli.aws,
        });

    let registry = ComponentRegistry::with_builtins();
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
    let deployments = ManifestLoader::new(&registry, &settings).load(runner.clone())?;

    let deployment = deployments.get(cli.command.deployment())?;
    deployment.check_paths()?;

    dispatch(deployment, cli.command, runner.as_ref(), &settings.tools).await
}

async fn dispatch(
    deployment: &Deployment,
    command: Commands,
    runner: &dyn CommandRunner,
    tools: &Tools,
) -> Result<()> {
    let name = deployment.name();
    match command {
        Commands::Apply { auto_approve, .. } => deployment
            .apply(auto_approve)
            .await
            .with_context(|| format!("apply failed for deployment [{name}]"))?,
        Commands::Bootstrap { .. } => deployment.bootstrap().await?,
        Commands::Build { nocache, .. } => deployment
            .build(nocache)
            .await
            .with_context(|| format!("build failed for deployment [{name}]"))?,
        Commands::Deploy { .. } => deployment
            .deploy()
            .await
            .with_context(|| format!("deploy failed for deployment [{name}]"))?,
        Commands::Destroy { auto_approve, .. } => deployment
            .destroy(auto_approve)
            .await
            .with_context(|| format!("destroy failed for deployment [{name}]"))?,
        Commands::Package { .. } => deployment
            .package()
            .await
            .with_context(|| format!("package failed for deployment [{name}]"))?,
        Commands::Unbootstrap { .. } => deployment.unbootstrap().await?,
        Commands::Undeploy { .. } => deployment
            .undeploy()
            .await
            .with_context(|| format!("undeploy failed for deployment [{name}]"))?,
        Commands::AwsMfaLogin {
            token, device_arn, ..
        } => MfaLogin::with_device(name, device_arn, token)?
            .run(runner, tools)
            .await
            .with_context(|| format!("MFA login failed for deployment [{name}]"))?,
    }

    info!(deployment = %name, "Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_with_nocache() {
        let cli = Cli::try_parse_from(["bpad", "build", "dev", "--nocache"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Build { ref deployment, nocache: true } if deployment == "dev"
        ));
    }

    #[test]
    fn parses_apply_auto_approve() {
        let cli = Cli::try_parse_from(["bpad", "apply", "prod", "--auto-approve"]).unwrap();
        assert!(matches!(cli.command, Commands::Apply { auto_approve: true, .. }));
        assert_eq!(cli.command.deployment(), "prod");
    }

    #[test]
    fn mfa_login_accepts_underscore_alias() {
        let cli = Cli::try_parse_from([
            "bpad",
            "aws_mfa_login",
            "dev",
            "123456",
            "--device-arn",
            "arn:aws:iam::1:mfa/ops",
        ])
        .unwrap();
        match cli.command {
            Commands::AwsMfaLogin {
                deployment,
                token,
                device_arn,
            } => {
                assert_eq!(deployment, "dev");
                assert_eq!(token, "123456");
                assert_eq!(device_arn.as_deref(), Some("arn:aws:iam::1:mfa/ops"));
            }
            _ => panic!("expected AwsMfaLogin"),
        }
    }

    #[test]
    fn deployment_name_is_required() {
        assert!(Cli::try_parse_from(["bpad", "deploy"]).is_err());
    }
}
