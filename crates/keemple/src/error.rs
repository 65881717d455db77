//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use keemple_config::ConfigError;
use keemple_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Keemple cloud at {url}")]
    #[diagnostic(
        code(keemple::connection_failed),
        help(
            "Check your network connection and the base URL.\n\
             {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Keemple cloud unavailable: {reason}")]
    #[diagnostic(
        code(keemple::unavailable),
        help("The cloud kept failing after retries. Try again later.")
    )]
    Unavailable { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(keemple::auth_failed),
        help(
            "Verify the account and country code in your profile.\n\
             Run: keemple config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(keemple::no_credentials),
        help(
            "Configure credentials with: keemple config init\n\
             Or set KEEMPLE_ACCOUNT and KEEMPLE_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(keemple::not_found),
        help("Run: keemple devices list to see available devices")
    )]
    NotFound { identifier: String },

    // ── Operations ───────────────────────────────────────────────────
    #[error("'{operation}' is not supported by {kind} devices")]
    #[diagnostic(code(keemple::unsupported))]
    Unsupported { operation: String, kind: String },

    #[error("API error{}: {message}", .code.map(|c| format!(" ({c})")).unwrap_or_default())]
    #[diagnostic(code(keemple::api_error))]
    ApiError { code: Option<i64>, message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(keemple::internal))]
    Internal(String),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(keemple::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(keemple::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: keemple config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(keemple::no_config),
        help(
            "Create one with: keemple config init\n\
             Expected at: {path}\n\
             Or pass --account and set KEEMPLE_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(keemple::config))]
    Config(String),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(keemple::timeout),
        help("Increase the timeout with --timeout.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Unavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotConnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                reason: "The hub is not connected".into(),
            },
            CoreError::Timeout => CliError::Timeout,
            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::Unavailable { identifier: _, reason } => CliError::Unavailable { reason },
            CoreError::Unsupported { operation, kind } => CliError::Unsupported { operation, kind },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Api {
                message,
                code,
                status: _,
            } => CliError::ApiError { code, message },
            CoreError::Config { message } => CliError::Config(message),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
