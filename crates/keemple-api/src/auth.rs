use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Country code sent when the account has no explicit one.
pub const DEFAULT_COUNTRY_CODE: &str = "0";

/// Account credentials for the Keemple cloud.
///
/// The account identifier is the phone number or e-mail used in the
/// Keemple app. Immutable once a session has been established from it.
#[derive(Debug, Clone)]
pub struct Credentials {
    account_id: String,
    password: SecretString,
    country_code: String,
}

impl Credentials {
    /// Build credentials. An empty country code falls back to
    /// [`DEFAULT_COUNTRY_CODE`].
    pub fn new(
        account_id: impl Into<String>,
        password: SecretString,
        country_code: impl Into<String>,
    ) -> Self {
        let country_code = country_code.into();
        let country_code = if country_code.trim().is_empty() {
            DEFAULT_COUNTRY_CODE.to_owned()
        } else {
            country_code.trim().to_owned()
        };
        Self {
            account_id: account_id.into().trim().to_owned(),
            password,
            country_code,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Reject credentials that can never authenticate.
    pub fn validate(&self) -> Result<(), Error> {
        if self.account_id.is_empty() {
            return Err(Error::InvalidCredentials {
                message: "account id is empty".into(),
            });
        }
        if self.password.expose_secret().is_empty() {
            return Err(Error::InvalidCredentials {
                message: "password is empty".into(),
            });
        }
        Ok(())
    }
}

/// An authenticated session with the Keemple cloud.
///
/// Owned by [`KeempleClient`](crate::KeempleClient); callers receive clones
/// for inspection only.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    /// Create a session. An empty token is an authentication failure.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Result<Self, Error> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::Authentication {
                message: "login response carried no session token".into(),
            });
        }
        Ok(Self { token, expires_at })
    }

    /// Create a session that expires `ttl` from now.
    pub fn with_ttl(token: impl Into<String>, ttl: Duration) -> Result<Self, Error> {
        Self::new(token, Utc::now() + ttl)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `true` once the expiry timestamp has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn empty_country_code_defaults() {
        let creds = Credentials::new("user1", secret("pw"), "");
        assert_eq!(creds.country_code(), "0");
    }

    #[test]
    fn validate_rejects_empty_account() {
        let creds = Credentials::new("  ", secret("pw"), "0");
        assert!(matches!(
            creds.validate(),
            Err(Error::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_password() {
        let creds = Credentials::new("user1", secret(""), "0");
        assert!(creds.validate().is_err());
    }

    #[test]
    fn validate_accepts_complete_credentials() {
        let creds = Credentials::new("user1", secret("pw"), "380");
        assert!(creds.validate().is_ok());
        assert_eq!(creds.country_code(), "380");
    }

    #[test]
    fn session_requires_token() {
        assert!(Session::with_ttl("", Duration::minutes(5)).is_err());
    }

    #[test]
    fn session_expiry() {
        let session = Session::with_ttl("abc", Duration::minutes(5)).unwrap();
        assert!(!session.is_expired());
        assert!(session.is_expired_at(Utc::now() + Duration::minutes(6)));
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = Session::with_ttl("very-secret", Duration::minutes(5)).unwrap();
        let dbg = format!("{session:?}");
        assert!(!dbg.contains("very-secret"));
    }
}
