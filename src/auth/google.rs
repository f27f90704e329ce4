//! Google OAuth 2.0 strategy.

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::auth::strategy::{AuthError, Callback, Challenge, Identity, Strategy};
use crate::config::AuthConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Google userinfo response.
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl From<UserInfo> for Identity {
    fn from(info: UserInfo) -> Self {
        Identity {
            provider: GoogleStrategy::NAME.to_string(),
            subject: info.sub,
            display_name: info.name,
            email: info.email,
            avatar_url: info.picture,
        }
    }
}

/// Authorization-code flow against Google.
pub struct GoogleStrategy {
    client: BasicClient,
    http: reqwest::Client,
    userinfo_url: String,
}

impl GoogleStrategy {
    pub const NAME: &'static str = "google";

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let invalid = |e: oauth2::url::ParseError| AuthError::Provider(e.to_string());

        let client = BasicClient::new(
            ClientId::new(config.google_client_id.clone()),
            Some(ClientSecret::new(config.google_client_secret.clone())),
            AuthUrl::new(AUTH_URL.to_string()).map_err(invalid)?,
            Some(TokenUrl::new(TOKEN_URL.to_string()).map_err(invalid)?),
        )
        .set_redirect_uri(RedirectUrl::new(config.google_callback_url.clone()).map_err(invalid)?);

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            userinfo_url: USERINFO_URL.to_string(),
        })
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "Userinfo returned {}",
                response.status()
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("Invalid userinfo response: {e}")))?;
        Ok(info.into())
    }
}

#[async_trait]
impl Strategy for GoogleStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn challenge(&self) -> Result<Challenge, AuthError> {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (url, state) = request.url();

        Ok(Challenge {
            redirect_url: url.to_string(),
            state: state.secret().clone(),
        })
    }

    async fn verify(&self, callback: &Callback) -> Result<Identity, AuthError> {
        if let Some(reason) = &callback.error {
            return Err(AuthError::Denied(reason.clone()));
        }
        let code = callback.code.clone().ok_or(AuthError::Unauthenticated)?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                error!(error = %e, "Google token exchange failed");
                AuthError::Provider(format!("Token exchange failed: {e}"))
            })?;

        let identity = self.fetch_identity(token.access_token().secret()).await?;
        debug!(subject = %identity.subject, "Google identity verified");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> GoogleStrategy {
        GoogleStrategy::from_config(&AuthConfig {
            google_enabled: true,
            google_client_id: "client-123".into(),
            google_client_secret: "shh".into(),
            ..AuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_challenge_url() {
        let challenge = strategy().challenge().unwrap();
        assert!(challenge.redirect_url.starts_with(AUTH_URL));
        assert!(challenge.redirect_url.contains("client_id=client-123"));
        assert!(challenge.redirect_url.contains("scope=openid+email+profile"));
        assert!(challenge
            .redirect_url
            .contains(&format!("state={}", challenge.state)));
    }

    #[test]
    fn test_challenge_state_is_random() {
        let strategy = strategy();
        assert_ne!(
            strategy.challenge().unwrap().state,
            strategy.challenge().unwrap().state
        );
    }

    #[tokio::test]
    async fn test_denied_consent() {
        let callback = Callback {
            error: Some("access_denied".into()),
            ..Callback::default()
        };
        assert_eq!(
            strategy().verify(&callback).await,
            Err(AuthError::Denied("access_denied".into()))
        );
    }

    #[tokio::test]
    async fn test_missing_code() {
        assert_eq!(
            strategy().verify(&Callback::default()).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_userinfo_mapping() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"42","name":"Ada","email":"ada@example.com","picture":"https://x/p.png"}"#,
        )
        .unwrap();
        let identity = Identity::from(info);
        assert_eq!(identity.provider, "google");
        assert_eq!(identity.subject, "42");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://x/p.png"));
    }
}
