//! Error taxonomy for bpad.

use std::path::PathBuf;

/// Errors produced while loading manifests or running lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum BpadError {
    /// Manifest file does not exist or cannot be read
    #[error("manifest not found: {path}")]
    ManifestNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest file is not valid YAML or does not match the record layout
    #[error("invalid manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown component type [{type_name}]; registered types: {}", known.join(", "))]
    UnknownComponentType {
        type_name: String,
        known: Vec<String>,
    },

    #[error("invalid deployment specified: {name}\n    Supported values: {}", valid.join(", "))]
    UnknownDeployment { name: String, valid: Vec<String> },

    #[error(
        "the specified path for deployment [{deployment}], or one of its components, was not found: {}. \
         Paths in the manifest must be absolute, relative to the current working directory, \
         or relative to the directory in BPAD_TARGET",
        path.display()
    )]
    PathNotFound { deployment: String, path: PathBuf },

    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    /// External program could not be started at all
    #[error("failed to execute [{command}]: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External program ran and exited non-zero
    #[error("command [{command}] exited with status {exit_code}\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("failed to read terraform outputs for deployment [{deployment}] at {}: {reason}", path.display())]
    ProvisioningOutputs {
        deployment: String,
        path: PathBuf,
        reason: String,
    },

    #[error("terraform outputs are missing required keys: {}", missing.join(", "))]
    MissingOutputKeys { missing: Vec<String> },

    #[error("unexpected response from identity provider: {0}")]
    CredentialResponse(String),

    #[error("{0} is not supported yet")]
    Unsupported(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for bpad operations.
pub type Result<T> = std::result::Result<T, BpadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_deployment_lists_valid_names() {
        let err = BpadError::UnknownDeployment {
            name: "qa".to_string(),
            valid: vec!["dev".to_string(), "prod".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("qa"));
        assert!(msg.contains("dev, prod"));
    }

    #[test]
    fn command_failed_carries_captured_output() {
        let err = BpadError::CommandFailed {
            command: "kubectl apply -f -".to_string(),
            exit_code: 1,
            stdout: "partial".to_string(),
            stderr: "forbidden".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("kubectl apply -f -"));
        assert!(msg.contains("STDOUT: partial"));
        assert!(msg.contains("STDERR: forbidden"));
    }

    #[test]
    fn missing_output_keys_names_offenders() {
        let err = BpadError::MissingOutputKeys {
            missing: vec!["Foo".to_string(), "bar".to_string()],
        };
        assert!(err.to_string().contains("Foo, bar"));
    }

    #[test]
    fn unsupported_names_operation() {
        assert_eq!(
            BpadError::Unsupported("bootstrap").to_string(),
            "bootstrap is not supported yet"
        );
    }
}
