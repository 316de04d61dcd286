use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::AuthError;

const SCOPES: &str = "openid email profile";

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub authorization: String,
    pub token: String,
    pub userinfo: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            authorization: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// Fields of Google's userinfo response we care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleProfile {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
}

impl GoogleProfile {
    /// Display name, falling back to the local part of the email address
    pub fn display_name(&self) -> Option<String> {
        match (&self.name, &self.email) {
            (Some(name), _) if !name.trim().is_empty() => Some(name.trim().to_string()),
            (_, Some(email)) => email.split('@').next().map(str::to_string),
            _ => None,
        }
    }
}

/// Authorization-code flow against Google's OAuth2 endpoints.
pub struct GoogleOAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: GoogleEndpoints,
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            redirect_uri,
            endpoints: GoogleEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn authorization_url(&self, state: &str) -> Result<url::Url, AuthError> {
        let mut url = url::Url::parse(&self.endpoints.authorization)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoints.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Token endpoint returned {}: {}", status, body);
            return Err(AuthError::Provider(format!("token endpoint returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid token response: {}", e)))
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, AuthError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            tracing::warn!("Userinfo endpoint returned {}", response.status());
            return Err(AuthError::Provider(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid userinfo response: {}", e)))
    }

    /// Exchange the callback code and load the signed-in profile.
    pub async fn authenticate(&self, code: &str) -> Result<GoogleProfile, AuthError> {
        let tokens = self.exchange_code(code).await?;
        tracing::debug!("Exchanged authorization code, scope: {:?}", tokens.scope);
        self.fetch_profile(&tokens.access_token).await
    }
}

/// Random CSRF state for one login attempt.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
