use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::azure::RepositoryCoordinates;
use crate::config::CredentialsConfig;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to spawn credential helper '{command}': {source}")]
    ProcessSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential helper exited with {status}: {stderr}")]
    HelperFailed { status: String, stderr: String },

    #[error("Failed to parse credentials from helper output: '{stdout}'")]
    CredentialParseFailed { stdout: String },
}

/// Email and personal access token for the repository host.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub access_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(
        &self,
        coordinates: &RepositoryCoordinates,
    ) -> Result<Credentials, CredentialError>;
}

/// Asks a git credential helper (by default `git credential-manager get`)
/// for the repository's credentials.
#[derive(Debug, Clone)]
pub struct GitCredentialManager {
    program: String,
    args: Vec<String>,
    host: String,
}

impl GitCredentialManager {
    pub fn new(config: &CredentialsConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            host: config.host.clone(),
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CredentialSource for GitCredentialManager {
    #[instrument(skip(self), fields(helper = %self.command_line()))]
    async fn credentials(
        &self,
        coordinates: &RepositoryCoordinates,
    ) -> Result<Credentials, CredentialError> {
        let spawn_failed = |source| CredentialError::ProcessSpawnFailed {
            command: self.command_line(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        if let Some(mut stdin) = child.stdin.take() {
            let request = helper_request(&self.host, coordinates);
            match stdin.write_all(request.as_bytes()).await {
                Ok(()) => {}
                // The helper exited without reading; its status and stderr
                // tell why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("credential helper closed stdin early");
                }
                Err(e) => return Err(spawn_failed(e)),
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_failed)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(status = %output.status, stdout_bytes = stdout.len(), "credential helper finished");

        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(CredentialError::HelperFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        parse_credentials(&stdout)
    }
}

/// Request in the git credential protocol: key=value lines ended by a
/// blank line.
pub fn helper_request(host: &str, coordinates: &RepositoryCoordinates) -> String {
    format!(
        "protocol=https\nhost={}\npath={}/{}/_git/{}\n\n",
        host, coordinates.organization, coordinates.project, coordinates.repository_id
    )
}

/// Read `username=` and `password=` lines. Values keep everything after the
/// first `=`.
pub fn parse_credentials(stdout: &str) -> Result<Credentials, CredentialError> {
    let mut email = None;
    let mut access_token = None;

    for line in stdout.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("username=") {
            email = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("password=") {
            access_token = Some(value.to_string());
        }
    }

    match (email, access_token) {
        (Some(email), Some(access_token)) if !email.is_empty() && !access_token.is_empty() => {
            Ok(Credentials {
                email,
                access_token,
            })
        }
        _ => Err(CredentialError::CredentialParseFailed {
            stdout: redact(stdout),
        }),
    }
}

fn redact(stdout: &str) -> String {
    stdout
        .lines()
        .map(|line| match line.split_once('=') {
            Some(("password", _)) => "password=<redacted>".to_string(),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
