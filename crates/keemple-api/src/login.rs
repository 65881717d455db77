// Session endpoints: login and logout.
//
// Login uses query parameters rather than a body. The token comes from
// the response when present, otherwise from the session cookie set by
// the server.

use chrono::Duration as ChronoDuration;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::client::{DEFAULT_PLATFORM, KeempleClient};
use crate::error::Error;
use crate::models::{Envelope, LoginResponse};

const LOGIN_PATH: &str = "phoneuser/login";
const LOGOUT_PATH: &str = "phoneuser/logout";
const LANGUAGE: &str = "en_US";

impl KeempleClient {
    /// Perform the login round-trip without touching the stored session.
    pub(crate) async fn login(&self) -> Result<Session, Error> {
        self.credentials().validate()?;

        let creds = self.credentials();
        debug!(account = creds.account_id(), "logging in");

        let params = [
            ("platform", DEFAULT_PLATFORM.to_owned()),
            ("phonenumber", creds.account_id().to_owned()),
            ("countrycode", creds.country_code().to_owned()),
            ("password", creds.password().expose_secret().to_owned()),
            ("language", LANGUAGE.to_owned()),
        ];

        let resp: LoginResponse = self
            .post_with_retry(LOGIN_PATH, &params, None)
            .await
            .map_err(|e| match e {
                Error::Api { code, message } => Error::InvalidCredentials {
                    message: format!("{message} (code {code})"),
                },
                Error::SessionExpired => Error::InvalidCredentials {
                    message: "login rejected".into(),
                },
                other => other,
            })?;

        let token = resp
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| self.cookie_header())
            .unwrap_or_default();

        let ttl = resp
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(ChronoDuration::try_seconds)
            .unwrap_or_else(|| self.session_ttl());

        let session = Session::with_ttl(token, ttl)?;
        info!(expires_at = %session.expires_at(), "login successful");
        Ok(session)
    }

    /// End the current session, if any.
    ///
    /// The session is dropped locally even when the server call fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let Some(session) = self.take_session().await else {
            return Ok(());
        };

        let params = [("platform", DEFAULT_PLATFORM.to_owned())];
        let url = self.url(LOGOUT_PATH)?;
        let result = self
            .http()
            .post(url)
            .query(&params)
            .query(&[("token", session.token())])
            .send()
            .await;

        match result {
            Ok(resp) => {
                let _: Envelope = crate::client::parse_response(resp).await?;
                debug!("logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "logout request failed");
                Err(Error::Transport(e))
            }
        }
    }
}
