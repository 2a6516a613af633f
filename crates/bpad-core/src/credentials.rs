//! Temporary AWS credentials obtained with an MFA token.
//!
//! Expects two AWS CLI profiles per deployment: `<deployment>-auth` holding
//! long-lived keys, and `<deployment>` which receives the session
//! credentials returned by STS.

use serde::Deserialize;
use tracing::info;

use crate::config::{Tools, ENV_MFA_DEVICE_ARN};
use crate::error::{BpadError, Result};
use crate::runner::{CommandRunner, CommandSpec};

/// Session credentials as returned by `aws sts get-session-token`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionTokenResponse {
    credentials: SessionCredentials,
}

/// Parse the JSON body printed by `aws sts get-session-token`.
pub fn parse_session_token(stdout: &str) -> Result<SessionCredentials> {
    serde_json::from_str::<SessionTokenResponse>(stdout)
        .map(|response| response.credentials)
        .map_err(|e| BpadError::CredentialResponse(e.to_string()))
}

/// One MFA login for a deployment's AWS profile.
#[derive(Debug, Clone)]
pub struct MfaLogin {
    pub deployment: String,
    pub device_arn: String,
    pub token: String,
}

impl MfaLogin {
    pub fn new(
        deployment: impl Into<String>,
        device_arn: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            deployment: deployment.into(),
            device_arn: device_arn.into(),
            token: token.into(),
        }
    }

    /// Like [`MfaLogin::new`], failing with [`BpadError::MissingEnv`] when no
    /// device ARN was supplied (normally read from `MFA_DEVICE_ARN`).
    pub fn with_device(
        deployment: impl Into<String>,
        device_arn: Option<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let device_arn = device_arn
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| BpadError::MissingEnv(ENV_MFA_DEVICE_ARN.to_string()))?;
        Ok(Self::new(deployment, device_arn, token))
    }

    fn auth_profile(&self) -> String {
        format!("{}-auth", self.deployment)
    }

    /// Exchange the token for session credentials and store them in the
    /// deployment's profile.
    pub async fn run(&self, runner: &dyn CommandRunner, tools: &Tools) -> Result<()> {
        let auth_profile = self.auth_profile();
        info!(deployment = %self.deployment, profile = %auth_profile, "Requesting session token");
        let spec = CommandSpec::new(tools.aws.as_str())
            .args(["--profile", auth_profile.as_str()])
            .args(["sts", "get-session-token", "--serial-number", self.device_arn.as_str()])
            .arg("--token-code")
            .secret_arg(self.token.as_str())
            .sensitive();
        let output = runner.run(&spec).await?;
        let credentials = parse_session_token(&output.stdout)?;

        let settings = [
            ("aws_access_key_id", &credentials.access_key_id),
            ("aws_secret_access_key", &credentials.secret_access_key),
            ("aws_session_token", &credentials.session_token),
        ];
        for (key, value) in settings {
            let spec = CommandSpec::new(tools.aws.as_str())
                .args(["--profile", self.deployment.as_str(), "configure", "set", key])
                .secret_arg(value.as_str());
            runner.run(&spec).await?;
        }

        info!(
            deployment = %self.deployment,
            profile = %self.deployment,
            "Stored temporary credentials"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;

    const STS_RESPONSE: &str = r#"{
        "Credentials": {
            "AccessKeyId": "ASIAEXAMPLE",
            "SecretAccessKey": "wJalrXUtnFEMI",
            "SessionToken": "FwoGZXIvYXdzEXAMPLE",
            "Expiration": "2026-10-20T12:00:00Z"
        }
    }"#;

    #[test]
    fn parse_session_token_reads_credentials() {
        let creds = parse_session_token(STS_RESPONSE).unwrap();
        assert_eq!(creds.access_key_id, "ASIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "wJalrXUtnFEMI");
        assert_eq!(creds.session_token, "FwoGZXIvYXdzEXAMPLE");
    }

    #[test]
    fn parse_session_token_rejects_unexpected_body() {
        let result = parse_session_token(r#"{"Error": "AccessDenied"}"#);
        assert!(matches!(result, Err(BpadError::CredentialResponse(_))));
    }

    #[test]
    fn with_device_requires_arn() {
        assert!(matches!(
            MfaLogin::with_device("dev", None, "123456"),
            Err(BpadError::MissingEnv(var)) if var == "MFA_DEVICE_ARN"
        ));
        assert!(MfaLogin::with_device("dev", Some(String::new()), "123456").is_err());
        let login = MfaLogin::with_device("dev", Some("arn".to_string()), "123456").unwrap();
        assert_eq!(login.device_arn, "arn");
    }

    #[tokio::test]
    async fn run_requests_token_then_configures_profile() {
        let runner = ScriptedRunner::new().respond("aws --profile dev-auth sts", STS_RESPONSE);
        let login = MfaLogin::new("dev", "arn:aws:iam::123456789012:mfa/ops", "123456");

        login.run(&runner, &Tools::default()).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "aws --profile dev-auth sts get-session-token --serial-number arn:aws:iam::123456789012:mfa/ops --token-code ****",
                "aws --profile dev configure set aws_access_key_id ****",
                "aws --profile dev configure set aws_secret_access_key ****",
                "aws --profile dev configure set aws_session_token ****",
            ]
        );
        let calls = runner.calls();
        assert_eq!(calls[0].args.last().map(String::as_str), Some("123456"));
        assert_eq!(calls[3].args.last().map(String::as_str), Some("FwoGZXIvYXdzEXAMPLE"));
    }

    #[tokio::test]
    async fn sts_failure_leaves_profile_untouched() {
        let runner = ScriptedRunner::new().fail("aws --profile dev-auth sts", 255, "invalid MFA code");
        let login = MfaLogin::new("dev", "arn:aws:iam::123456789012:mfa/ops", "000000");

        let result = login.run(&runner, &Tools::default()).await;

        assert!(matches!(result, Err(BpadError::CommandFailed { exit_code: 255, .. })));
        assert_eq!(runner.count("aws --profile dev configure"), 0);
    }

    #[tokio::test]
    async fn failed_configure_does_not_leak_secret() {
        let runner = ScriptedRunner::new()
            .respond("aws --profile dev-auth sts", STS_RESPONSE)
            .fail("aws --profile dev configure set aws_secret_access_key", 1, "read-only file");
        let login = MfaLogin::new("dev", "arn", "123456");

        let err = login.run(&runner, &Tools::default()).await.unwrap_err();

        assert!(!err.to_string().contains("wJalrXUtnFEMI"));
        assert_eq!(runner.count("aws --profile dev configure"), 2);
    }
}
