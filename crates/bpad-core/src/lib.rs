//! bpad core library
//!
//! Loads a deployments manifest and drives each deployment's lifecycle:
//! terraform for infrastructure (`apply`, `destroy`) and an ordered list of
//! components for software (`build`, `package`, `deploy`, `undeploy`).
//!
//! External programs are reached through the [`CommandRunner`] seam so the
//! whole lifecycle can be exercised against [`fakes::ScriptedRunner`].

pub mod component;
pub mod components;
pub mod config;
pub mod credentials;
pub mod deployment;
pub mod error;
pub mod fakes;
pub mod kubectl;
pub mod manifest;
pub mod provisioning;
pub mod registry;
pub mod runner;
pub mod telemetry;

pub use component::{check_tf_outputs, Component, ComponentEnv, LifecycleContext};
pub use config::{Settings, Tools, DEFAULT_MANIFEST, ENV_MFA_DEVICE_ARN, ENV_TARGET};
pub use credentials::{MfaLogin, SessionCredentials};
pub use deployment::{Deployment, APPLY_WAIT_DEFAULT};
pub use error::{BpadError, Result};
pub use manifest::{parse_manifest, Deployments, ManifestLoader};
pub use provisioning::{TfOutput, TfOutputs};
pub use registry::{ComponentFactory, ComponentRegistry};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use telemetry::init_tracing;
