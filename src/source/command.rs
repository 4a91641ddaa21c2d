//! Secret source backed by the secret manager's command-line client

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{SecretEntry, SecretSource, parse_entries};
use crate::credentials::AccessToken;
use crate::error::FetchError;

/// Environment variable the child reads its access token from
const CHILD_TOKEN_ENV: &str = "BWS_ACCESS_TOKEN";

/// Placeholder in the argument list replaced by the project id
const SCOPE_PLACEHOLDER: &str = "{scope}";

/// Runs an external CLI (by default `bws secret list <project> --output json`)
/// and parses its stdout.
///
/// The token is handed over through the child's environment so it never
/// shows up in process listings.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn render_args(&self, scope: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(SCOPE_PLACEHOLDER, scope))
            .collect()
    }
}

/// Map a failed run to the closest fetch error using the CLI's stderr
fn classify_failure(status: std::process::ExitStatus, stderr: &str) -> FetchError {
    let lower = stderr.to_lowercase();
    if lower.contains("access token") || lower.contains("unauthenticated") || lower.contains("401")
    {
        FetchError::Unauthenticated
    } else if lower.contains("project") || lower.contains("403") || lower.contains("404") {
        FetchError::Unauthorized
    } else {
        let detail = stderr.lines().next().unwrap_or("").trim();
        FetchError::Unreachable(format!("exited with {}: {}", status, detail))
    }
}

#[async_trait]
impl SecretSource for CommandSource {
    async fn fetch(
        &self,
        scope: &str,
        credential: &AccessToken,
        timeout: Duration,
    ) -> Result<Vec<SecretEntry>, FetchError> {
        log::debug!("Running {} for project {}", self.program, scope);

        let child = Command::new(&self.program)
            .args(self.render_args(scope))
            .env(CHILD_TOKEN_ENV, credential.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Unreachable(format!("failed to run {}: {}", self.program, e)))?;

        // Dropping the wait future on timeout kills the child
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
            .map_err(|e| FetchError::Unreachable(format!("{} failed: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(output.status, &stderr));
        }

        parse_entries(&output.stdout)
    }
}
