//! Component lifecycle contract and shared helpers.
//!
//! A component wraps one directory of configuration or source (terraform
//! modules, kubernetes manifests, application code) and knows how to build,
//! package, deploy and undeploy it. Concrete components are registered by
//! type name in a [`ComponentRegistry`](crate::registry::ComponentRegistry)
//! and instantiated when the manifest is loaded.
//!
//! Components never touch process-wide state. Everything a component needs
//! (the command runner, tool names, and values exported by earlier components)
//! arrives through [`LifecycleContext`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::config::Tools;
use crate::error::{BpadError, Result};
use crate::provisioning::TfOutputs;
use crate::runner::CommandRunner;

/// Ordered set of variables handed to components and their child processes.
///
/// Names are stored upper-cased when set through the helper methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentEnv {
    vars: BTreeMap<String, String>,
}

impl ComponentEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one variable; the name is upper-cased.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_uppercase(), value.into());
    }

    /// Copy a key/value mapping in, upper-casing every name.
    pub fn set_vars<K, V, I>(&mut self, keys_values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in keys_values {
            self.set(key.as_ref(), value);
        }
    }

    /// Copy terraform outputs in, upper-casing names and stringifying values.
    pub fn set_from_tf_outputs(&mut self, outputs: &TfOutputs) {
        for (key, output) in outputs {
            self.set(key, output.value_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Substitute `$NAME` and `${NAME}` references.
    ///
    /// Values set on this env win over the process environment. References
    /// that resolve to neither are left in the text unchanged.
    pub fn expand(&self, text: &str) -> String {
        shellexpand::env_with_context_no_errors(text, |name: &str| {
            self.get(name)
                .map(str::to_string)
                .or_else(|| std::env::var(name).ok())
        })
        .into_owned()
    }
}

/// State threaded through every component of one deployment-level call.
///
/// Created fresh for each `build`/`package`/`deploy`/`undeploy` call and passed
/// to the components in declared order, so values a component exports are
/// visible to the components after it within that call and nowhere else.
pub struct LifecycleContext<'a> {
    /// Name of the deployment being processed.
    pub deployment: &'a str,
    pub runner: &'a dyn CommandRunner,
    pub tools: &'a Tools,
    pub env: ComponentEnv,
}

impl<'a> LifecycleContext<'a> {
    pub fn new(deployment: &'a str, runner: &'a dyn CommandRunner, tools: &'a Tools) -> Self {
        Self {
            deployment,
            runner,
            tools,
            env: ComponentEnv::new(),
        }
    }
}

/// One unit of build/package/deploy/undeploy work tied to a directory.
///
/// Every phase is required. A component that has nothing to do in a phase
/// implements it as an explicit no-op.
#[async_trait]
pub trait Component: Send + Sync + Debug {
    /// Registry identifier this component was created from.
    fn kind(&self) -> &str;

    /// Directory holding this component's configuration or source.
    fn path(&self) -> &Path;

    /// Build dependencies and images. `force_rebuild` skips any cached artifacts.
    async fn build(&self, ctx: &mut LifecycleContext<'_>, force_rebuild: bool) -> Result<()>;

    /// Prepare artifacts for deployment.
    async fn package(&self, ctx: &mut LifecycleContext<'_>) -> Result<()>;

    /// Deploy onto infrastructure described by `outputs`.
    async fn deploy(&self, ctx: &mut LifecycleContext<'_>, outputs: &TfOutputs) -> Result<()>;

    /// Undo whatever [`Component::deploy`] did.
    async fn undeploy(&self, ctx: &mut LifecycleContext<'_>, outputs: &TfOutputs) -> Result<()>;
}

/// Verify that `outputs` contains every key in `required_keys`.
///
/// Comparison is case-insensitive. On failure the missing keys are reported
/// in the spelling they were requested with.
pub fn check_tf_outputs<S: AsRef<str>>(outputs: &TfOutputs, required_keys: &[S]) -> Result<()> {
    let available: Vec<String> = outputs.keys().map(|k| k.to_uppercase()).collect();
    let missing: Vec<String> = required_keys
        .iter()
        .map(|key| key.as_ref())
        .filter(|key| !available.contains(&key.to_uppercase()))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BpadError::MissingOutputKeys { missing })
    }
}
