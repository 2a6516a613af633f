//! Terraform invocation scoped to a deployment directory.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// One entry of `terraform output -json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfOutput {
    pub value: serde_json::Value,

    #[serde(default)]
    pub sensitive: bool,

    /// Terraform type descriptor, e.g. `"string"` or `["list", "string"]`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<serde_json::Value>,
}

impl TfOutput {
    /// Value rendered as plain text: strings verbatim, anything else as JSON.
    pub fn value_string(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Terraform outputs keyed by output name.
pub type TfOutputs = BTreeMap<String, TfOutput>;

/// Parse the stdout of `terraform output -json`.
///
/// Empty output (no outputs declared yet) parses as an empty mapping.
pub fn parse_outputs(stdout: &str) -> serde_json::Result<TfOutputs> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(TfOutputs::new());
    }
    serde_json::from_str(trimmed)
}

/// Terraform bound to one configuration directory.
pub struct Terraform<'a> {
    runner: &'a dyn CommandRunner,
    program: &'a str,
    dir: &'a Path,
}

impl<'a> Terraform<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: &'a str, dir: &'a Path) -> Self {
        Self {
            runner,
            program,
            dir,
        }
    }

    fn command(&self, subcommand: &str) -> CommandSpec {
        CommandSpec::new(self.program)
            .arg(subcommand)
            .current_dir(self.dir)
    }

    /// `terraform apply`. Without `auto_approve` the approval prompt is shown
    /// on the terminal and nothing is captured.
    pub async fn apply(&self, auto_approve: bool) -> Result<CommandOutput> {
        let spec = if auto_approve {
            self.command("apply").arg("-auto-approve")
        } else {
            self.command("apply").interactive()
        };
        let output = self.runner.run(&spec).await?;
        log_output(&output);
        Ok(output)
    }

    /// `terraform destroy`, prompting on the terminal unless `auto_approve`.
    pub async fn destroy(&self, auto_approve: bool) -> Result<CommandOutput> {
        let spec = if auto_approve {
            self.command("destroy").arg("-auto-approve")
        } else {
            self.command("destroy").interactive()
        };
        let output = self.runner.run(&spec).await?;
        log_output(&output);
        Ok(output)
    }

    /// Raw `terraform output -json`. Parsing is left to the caller so it can
    /// attach deployment context to parse failures. Marked sensitive since
    /// outputs may hold secrets.
    pub async fn output_json(&self) -> Result<CommandOutput> {
        let spec = self.command("output").arg("-json").sensitive();
        self.runner.run(&spec).await
    }
}

fn log_output(output: &CommandOutput) {
    let text = output.combined();
    if !text.trim().is_empty() {
        info!("{}", text.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn parse_outputs_reads_terraform_json() {
        let stdout = r#"{
            "cluster_endpoint": {"sensitive": false, "type": "string", "value": "https://k8s.example"},
            "node_count": {"sensitive": false, "type": "number", "value": 3}
        }"#;
        let outputs = parse_outputs(stdout).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["cluster_endpoint"].value_string(), "https://k8s.example");
        assert_eq!(outputs["node_count"].value, json!(3));
        assert_eq!(outputs["node_count"].value_string(), "3");
    }

    #[test]
    fn parse_outputs_accepts_missing_metadata() {
        let outputs = parse_outputs(r#"{"bucket": {"value": "assets"}}"#).unwrap();
        assert!(!outputs["bucket"].sensitive);
        assert!(outputs["bucket"].kind.is_none());
    }

    #[test]
    fn parse_outputs_empty_is_empty_map() {
        assert!(parse_outputs("  \n").unwrap().is_empty());
    }

    #[test]
    fn parse_outputs_rejects_garbage() {
        assert!(parse_outputs("Warning: No outputs found").is_err());
    }

    #[test]
    fn value_string_renders_structured_values_as_json() {
        let output = TfOutput {
            value: json!(["a", "b"]),
            sensitive: false,
            kind: None,
        };
        assert_eq!(output.value_string(), r#"["a","b"]"#);
    }

    #[tokio::test]
    async fn apply_runs_in_deployment_dir() {
        let runner = ScriptedRunner::new();
        let dir = PathBuf::from("/srv/infra/dev");
        let tf = Terraform::new(&runner, "terraform", &dir);

        tf.apply(false).await.unwrap();
        tf.destroy(true).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].display(), "terraform apply");
        assert_eq!(calls[0].cwd.as_deref(), Some(dir.as_path()));
        assert!(!calls[0].capture);
        assert_eq!(calls[1].display(), "terraform destroy -auto-approve");
        assert!(calls[1].capture);
    }

    #[tokio::test]
    async fn output_query_is_sensitive() {
        let runner = ScriptedRunner::new().fail("terraform output", 1, "no state");
        let dir = PathBuf::from("/srv/infra/dev");
        let tf = Terraform::new(&runner, "terraform", &dir);

        assert!(tf.output_json().await.is_err());
        assert!(runner.calls()[0].sensitive);
    }
}
