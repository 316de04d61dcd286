pub mod google;
pub mod session;

use std::time::Duration;

use game_types::SessionUser;

use crate::config::Config;
pub use google::{GoogleEndpoints, GoogleOAuth, GoogleProfile, generate_state};
pub use session::{SessionClaims, SessionSigner};

/// Cookie holding the signed session token
pub const SESSION_COOKIE: &str = "tq_session";
/// Cookie holding the CSRF state of a login in flight
pub const STATE_COOKIE: &str = "tq_oauth_state";
/// Cookie identifying an anonymous player
pub const GUEST_COOKIE: &str = "tq_player";

const STATE_COOKIE_TTL: Duration = Duration::from_secs(600);
const GUEST_COOKIE_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Google login plus the signed cookie session that follows it.
pub struct AuthService {
    google: GoogleOAuth,
    sessions: SessionSigner,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(google: GoogleOAuth, sessions: SessionSigner, secure_cookies: bool) -> Self {
        Self {
            google,
            sessions,
            secure_cookies,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let google = GoogleOAuth::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.redirect_uri(),
        );
        let sessions = SessionSigner::new(config.secret_key.as_bytes(), config.session_ttl());
        Self::new(google, sessions, config.uses_https())
    }

    /// Start a login: the redirect target and the state cookie that must come back with it.
    pub fn begin_login(&self) -> Result<(url::Url, String), AuthError> {
        let state = generate_state();
        let url = self.google.authorization_url(&state)?;
        let cookie = self.cookie(STATE_COOKIE, &state, STATE_COOKIE_TTL);
        Ok((url, cookie))
    }

    /// Validate the callback parameters and load the Google profile.
    pub async fn complete_login(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        expected_state: Option<&str>,
    ) -> Result<GoogleProfile, AuthError> {
        let code = code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)?;
        match (state, expected_state) {
            (Some(state), Some(expected)) if !state.is_empty() && state == expected => {}
            _ => {
                tracing::warn!("OAuth callback with missing or mismatched state");
                return Err(AuthError::StateMismatch);
            }
        }

        let profile = self.google.authenticate(code).await?;
        if profile.email.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::MissingEmail);
        }
        Ok(profile)
    }

    pub fn issue_session(&self, user: &SessionUser) -> Result<String, AuthError> {
        self.sessions.issue(user)
    }

    /// The signed-in caller, if the session cookie carries a valid token.
    pub fn session_user(&self, cookie: Option<&str>) -> Option<SessionUser> {
        let token = cookie?;
        match self.sessions.verify(token) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::debug!("Ignoring session cookie: {}", err);
                None
            }
        }
    }

    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(SESSION_COOKIE, token, self.sessions.ttl())
    }

    pub fn guest_cookie(&self, guest_id: &str) -> String {
        self.cookie(GUEST_COOKIE, guest_id, GUEST_COOKIE_TTL)
    }

    pub fn cookie(&self, name: &str, value: &str, max_age: Duration) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            name,
            value,
            max_age.as_secs()
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self, name: &str) -> String {
        self.cookie(name, "", Duration::ZERO)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to issue session token")]
    TokenIssue,
    #[error("Missing authorization code")]
    MissingCode,
    #[error("Invalid OAuth state")]
    StateMismatch,
    #[error("Identity provider did not return an email address")]
    MissingEmail,
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
