use thiserror::Error;

/// Top-level error type for the `keemple-api` crate.
///
/// Covers every failure mode of the cloud API surface: credential
/// validation, authentication, transport, the `resultCode` envelope, and
/// payload decoding. `keemple-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected locally (empty field) or by the login endpoint.
    /// Never retried.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Login round-trip succeeded at the HTTP level but produced no usable
    /// session (missing token, malformed response).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The server rejected the session (HTTP 401 or session result code).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status outside the auth range.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Keemple API ─────────────────────────────────────────────────
    /// Error carried in the `{resultCode, resultMessage}` envelope.
    #[error("Keemple API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// The requested device is not part of the account anymore.
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    /// Retries exhausted on a transient failure.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this error can never succeed on retry with the
    /// same credentials.
    pub fn is_credentials_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::Authentication { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if the account snapshot no longer lists the device.
    ///
    /// A bare HTTP 404 does not count: it says nothing about membership.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::DeviceNotFound { .. } => true,
            Self::RetriesExhausted { last, .. } => last.is_not_found(),
            _ => false,
        }
    }

    /// Returns `true` if retries were attempted and all of them failed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
