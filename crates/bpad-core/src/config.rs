//! Runtime settings assembled by the binary from flags and environment.

use std::path::{Path, PathBuf};

/// Default manifest file name, resolved against the current directory.
pub const DEFAULT_MANIFEST: &str = "deployments.yml";

/// Environment variable holding the base directory for manifest paths.
pub const ENV_TARGET: &str = "BPAD_TARGET";

/// Environment variable holding the ARN of the MFA device used by `aws-mfa-login`.
pub const ENV_MFA_DEVICE_ARN: &str = "MFA_DEVICE_ARN";

/// Executables for the external tools bpad drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub terraform: String,
    pub kubectl: String,
    pub aws: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            terraform: "terraform".to_string(),
            kubectl: "kubectl".to_string(),
            aws: "aws".to_string(),
        }
    }
}

/// Settings for loading a manifest.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the deployments manifest.
    pub manifest: PathBuf,
    /// Prefix for relative deployment paths.
    pub base_dir: Option<PathBuf>,
    pub tools: Tools,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            base_dir: None,
            tools: Tools::default(),
        }
    }
}

impl Settings {
    /// Set the base directory. An empty path counts as unset.
    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir.filter(|dir| !dir.as_os_str().is_empty());
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn with_tools(mut self, tools: Tools) -> Self {
        self.tools = tools;
        self
    }

    /// Resolve a manifest path against the base directory.
    ///
    /// Relative paths are joined onto the base directory when one is set;
    /// absolute paths and an unset base leave the path unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
