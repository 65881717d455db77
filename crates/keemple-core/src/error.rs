// ── Core error types ──
//
// User-facing errors from keemple-core. Consumers never see HTTP status
// codes or JSON parse failures directly. The `From<keemple_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Keemple cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Hub is not connected")]
    NotConnected,

    #[error("Request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Device unavailable: {identifier} ({reason})")]
    Unavailable { identifier: String, reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} on {kind} device")]
    Unsupported { operation: String, kind: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Keemple `resultCode`, if the envelope carried one.
        code: Option<i64>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Credentials were rejected or no session could be established.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// The cloud cannot be used at all: credentials rejected, retries
    /// exhausted, or no route to the server.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::Unavailable { .. }
                | Self::ConnectionFailed { .. }
                | Self::Timeout
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<keemple_api::Error> for CoreError {
    fn from(err: keemple_api::Error) -> Self {
        match err {
            keemple_api::Error::InvalidCredentials { message }
            | keemple_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            keemple_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session rejected after re-authentication".into(),
            },
            keemple_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), |u| u.to_string()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            keemple_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            keemple_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            keemple_api::Error::Http { status, message } => CoreError::Api {
                message,
                code: None,
                status: Some(status),
            },
            keemple_api::Error::Api { code, message } => CoreError::Api {
                message,
                code: Some(code),
                status: None,
            },
            keemple_api::Error::DeviceNotFound { device } => {
                CoreError::DeviceNotFound { identifier: device }
            }
            keemple_api::Error::RetriesExhausted { attempts, last } => CoreError::Unavailable {
                identifier: "cloud".into(),
                reason: format!("gave up after {attempts} attempts: {last}"),
            },
            keemple_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_map_to_auth() {
        let err: CoreError = keemple_api::Error::InvalidCredentials {
            message: "bad".into(),
        }
        .into();
        assert!(err.is_auth());
    }

    #[test]
    fn envelope_errors_are_not_connection_loss() {
        let err: CoreError = keemple_api::Error::Api {
            code: 30,
            message: "busy".into(),
        }
        .into();
        assert!(!err.is_connection_loss());
        assert!(CoreError::Timeout.is_connection_loss());
    }

    #[test]
    fn exhausted_maps_to_unavailable() {
        let err: CoreError = keemple_api::Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(keemple_api::Error::Http {
                status: 503,
                message: String::new(),
            }),
        }
        .into();
        assert!(matches!(err, CoreError::Unavailable { .. }));
    }

    #[test]
    fn api_code_is_preserved() {
        let err: CoreError = keemple_api::Error::Api {
            code: 12,
            message: "nope".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { code: Some(12), .. }));
    }
}
