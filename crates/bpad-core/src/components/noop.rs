//! Component with nothing to do in any phase.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::component::{Component, LifecycleContext};
use crate::error::Result;
use crate::provisioning::TfOutputs;

/// Placeholder for directories that only carry terraform configuration.
#[derive(Debug, Clone)]
pub struct Noop {
    path: PathBuf,
}

impl Noop {
    pub const KIND: &'static str = "noop";

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Component for Noop {
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

    async fn deploy(&self, _ctx: &mut LifecycleContext<'_>, _outputs: &TfOutputs) -> Result<()> {
        Ok(())
    }

    async fn undeploy(&self, _ctx: &mut LifecycleContext<'_>, _outputs: &TfOutputs) -> Result<()> {
        Ok(())
    }
}
