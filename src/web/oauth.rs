//! OAuth2 identity provider (authorization-code flow)

use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{ClubError, Result};
use crate::session::Identity;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity provider configuration
#[derive(Clone)]
pub struct IdentityProvider {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub http_client: reqwest::Client,
}

impl IdentityProvider {
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("OAUTH_CLIENT_ID").ok()?;
        let client_secret = std::env::var("OAUTH_CLIENT_SECRET").ok()?;
        let base_url = std::env::var("WEB_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Some(Self {
            client_id,
            client_secret,
            base_url,
            authorize_url: std::env::var("OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|_| GOOGLE_AUTHORIZE_URL.to_string()),
            token_url: std::env::var("OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| GOOGLE_TOKEN_URL.to_string()),
            userinfo_url: std::env::var("OAUTH_USERINFO_URL")
                .unwrap_or_else(|_| GOOGLE_USERINFO_URL.to_string()),
            http_client: reqwest::Client::new(),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url)
    }

    /// Provider sign-in URL; `state` is echoed back to the callback
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode("openid profile email"),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code and look up who signed in
    pub async fn sign_in(&self, code: &str) -> Result<Identity> {
        let redirect_uri = self.redirect_uri();
        let token_response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !token_response.status().is_success() {
            let error_text = token_response.text().await.unwrap_or_default();
            error!("Token exchange failed: {}", error_text);
            return Err(ClubError::Identity {
                message: "token exchange failed".to_string(),
            });
        }

        let token: TokenResponse = token_response.json().await?;
        debug!("Got access token, fetching user info...");

        let user_response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !user_response.status().is_success() {
            let error_text = user_response.text().await.unwrap_or_default();
            error!("User info request failed: {}", error_text);
            return Err(ClubError::Identity {
                message: "failed to get user info".to_string(),
            });
        }

        let user: ProviderUser = user_response.json().await?;
        Ok(user.into_identity())
    }
}

/// OAuth token response
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Userinfo response. OpenID providers send `sub`, others `id`.
#[derive(Deserialize, Debug)]
pub struct ProviderUser {
    #[serde(alias = "sub")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProviderUser {
    pub fn into_identity(self) -> Identity {
        let display_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or(self.email)
            .unwrap_or_else(|| self.id.clone());
        Identity {
            id: self.id,
            display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> IdentityProvider {
        IdentityProvider {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            base_url: "https://club.example".to_string(),
            authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    #[test]
    fn test_authorize_url_is_encoded() {
        let url = provider().authorize_url("abc 123");
        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fclub.example%2Fcallback"));
        assert!(url.contains("state=abc%20123"));
    }

    #[test]
    fn test_openid_userinfo() {
        let json = r#"{"sub": "1047", "name": "Ana Pérez", "email": "ana@example.com"}"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();
        let identity = user.into_identity();
        assert_eq!(identity.id, "1047");
        assert_eq!(identity.display_name, "Ana Pérez");
    }

    #[test]
    fn test_display_name_falls_back() {
        let json = r#"{"id": "77", "name": " ", "email": "luis@example.com"}"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.into_identity().display_name, "luis@example.com");

        let json = r#"{"id": "78"}"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.into_identity().display_name, "78");
    }
}
