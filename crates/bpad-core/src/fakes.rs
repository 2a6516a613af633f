//! In-memory command runner (testing only)
//!
//! `ScriptedRunner` records every command it is asked to run and answers from
//! scripted responses, so lifecycle code can be exercised without terraform,
//! kubectl or aws installed.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone)]
struct Response {
    /// Matches when the rendered command line starts with this prefix.
    prefix: String,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Fake runner answering from a list of `(prefix, response)` rules.
///
/// Rules are checked in registration order; the first whose prefix matches the
/// rendered command line wins. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<Vec<Response>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with exit 0 and `stdout`.
    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.push(prefix, 0, stdout, "");
        self
    }

    /// Answer commands starting with `prefix` with a non-zero exit.
    pub fn fail(self, prefix: &str, exit_code: i32, stderr: &str) -> Self {
        self.push(prefix, exit_code, "", stderr);
        self
    }

    fn push(&self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses.lock().unwrap().push(Response {
            prefix: prefix.to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines run so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    /// Number of commands whose rendered line starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let rendered = spec.display();
        let response = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|r| rendered.starts_with(&r.prefix))
            .cloned();

        let output = match response {
            Some(r) => CommandOutput {
                command: rendered,
                exit_code: r.exit_code,
                stdout: r.stdout,
                stderr: r.stderr,
            },
            None => CommandOutput::ok(rendered, ""),
        };

        if spec.check {
            output.checked_for(spec)
        } else {
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BpadError;

    #[tokio::test]
    async fn records_calls_and_matches_prefix() {
        let runner = ScriptedRunner::new().respond("terraform output", "{}");

        let out = runner
            .run(&CommandSpec::new("terraform").args(["output", "-json"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "{}");

        runner.run(&CommandSpec::new("kubectl")).await.unwrap();
        assert_eq!(runner.command_lines(), vec!["terraform output -json", "kubectl"]);
        assert_eq!(runner.count("terraform"), 1);
    }

    #[tokio::test]
    async fn scripted_failure_honours_check() {
        let runner = ScriptedRunner::new().fail("terraform apply", 1, "denied");

        let err = runner
            .run(&CommandSpec::new("terraform").arg("apply"))
            .await
            .unwrap_err();
        assert!(matches!(err, BpadError::CommandFailed { exit_code: 1, .. }));

        let out = runner
            .run(&CommandSpec::new("terraform").arg("apply").unchecked())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
    }
}
