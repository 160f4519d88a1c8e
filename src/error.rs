use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::azure::AzureError;
use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::input::InputError;
use crate::pr::processor::ProcessError;
use crate::report::ReportError;
use crate::store::StoreError;

/// What went wrong, by module. Each variant shows its inner error as is.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Azure(#[from] AzureError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Failed to encode pull requests as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every failure a command can end with. Nothing below the command handler
/// recovers from these; they bubble up and are reported once.
///
/// The call stack is captured at conversion, which is the `?` where a module
/// error first enters the command layer.
#[derive(Debug)]
pub struct AppError {
    failure: Failure,
    backtrace: Backtrace,
}

impl AppError {
    fn new(failure: Failure) -> Self {
        Self {
            failure,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Stable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match &self.failure {
            Failure::Config(_) => "ConfigError",
            Failure::Store(_) => "StoreError",
            Failure::Input(InputError::Cancelled(_)) => "Cancelled",
            Failure::Input(InputError::Invalid { .. }) => "InvalidInput",
            Failure::Input(InputError::Io(_)) => "InputError",
            Failure::Credential(CredentialError::ProcessSpawnFailed { .. }) => "ProcessSpawnFailed",
            Failure::Credential(CredentialError::HelperFailed { .. }) => "CredentialHelperFailed",
            Failure::Credential(CredentialError::CredentialParseFailed { .. }) => {
                "CredentialParseFailed"
            }
            Failure::Azure(AzureError::Unconfigured(_)) => "Unconfigured",
            Failure::Azure(AzureError::InvalidBaseUrl(_)) => "Unconfigured",
            Failure::Azure(AzureError::RequestFailed { .. }) => "RequestFailed",
            Failure::Azure(AzureError::NotFound { .. }) => "NotFound",
            Failure::Process(ProcessError::MalformedTitle { .. }) => "MalformedTitle",
            Failure::Report(ReportError::NoWorkspace(_)) => "NoWorkspace",
            Failure::Report(ReportError::Xlsx(_)) => "ReportWriteFailed",
            Failure::Json(_) => "JsonError",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.failure, f)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failure.source()
    }
}

macro_rules! app_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for AppError {
                fn from(err: $source) -> Self {
                    AppError::new(err.into())
                }
            }
        )*
    };
}

app_error_from!(
    ConfigError,
    StoreError,
    InputError,
    CredentialError,
    AzureError,
    ProcessError,
    ReportError,
    serde_json::Error,
);

/// Serializable view of an error and its cause chain.
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub name: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    /// Record for a top-level error, with the call stack captured where the
    /// error was raised when backtraces are enabled (RUST_BACKTRACE).
    pub fn capture(err: &AppError) -> Self {
        ErrorRecord {
            name: err.kind(),
            message: err.to_string(),
            backtrace: backtrace_lines(err.backtrace()),
            cause: err.source().map(|cause| Box::new(Self::from_error(cause))),
        }
    }

    fn from_error(err: &(dyn StdError + 'static)) -> Self {
        ErrorRecord {
            name: error_name(err),
            message: err.to_string(),
            backtrace: Vec::new(),
            cause: err.source().map(|cause| Box::new(Self::from_error(cause))),
        }
    }
}

fn backtrace_lines(backtrace: &Backtrace) -> Vec<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace
            .to_string()
            .lines()
            .map(|line| line.trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn error_name(err: &(dyn StdError + 'static)) -> &'static str {
    if let Some(app) = err.downcast_ref::<AppError>() {
        app.kind()
    } else if err.is::<reqwest::Error>() {
        "HttpError"
    } else if err.is::<std::io::Error>() {
        "IoError"
    } else if err.is::<toml::de::Error>() || err.is::<toml::ser::Error>() {
        "TomlError"
    } else if err.is::<serde_json::Error>() {
        "JsonError"
    } else if err.is::<rust_xlsxwriter::XlsxError>() {
        "XlsxError"
    } else {
        "Error"
    }
}

/// The single recovery point: log the error with its cause chain and stop.
pub fn report(err: &AppError) {
    let record = ErrorRecord::capture(err);
    let json = serde_json::to_string_pretty(&record)
        .unwrap_or_else(|_| format!("{{\"name\": \"{}\", \"message\": {:?}}}", record.name, record.message));
    error!(kind = record.name, error = %err, "command failed");
    eprintln!("{json}");
}
