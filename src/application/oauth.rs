use crate::domain::models::OAuthToken;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{OAuthHttpClient, OAuthTokenResponse, TokenGrant, TokenRequest};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Read-only access to calendars and their events, plus the identity scopes
/// needed to show who is signed in.
pub const CALENDAR_READONLY_SCOPES: [&str; 5] = [
    "https://www.googleapis.com/auth/calendar.events.readonly",
    "https://www.googleapis.com/auth/calendar.readonly",
    "openid",
    "profile",
    "email",
];

const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    pub fn default_scopes() -> Vec<String> {
        CALENDAR_READONLY_SCOPES.iter().map(|scope| scope.to_string()).collect()
    }

    /// Client settings are only needed to sign in or refresh; a still-valid
    /// stored token works without them.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::new("", "", DEFAULT_REDIRECT_URI, Self::default_scopes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> Clone for OAuthManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            credential_store: Arc::clone(&self.credential_store),
            oauth_client: Arc::clone(&self.oauth_client),
            now_provider: Arc::clone(&self.now_provider),
        }
    }
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn credential_store(&self) -> &Arc<S> {
        &self.credential_store
    }

    pub fn oauth_client(&self) -> &Arc<C> {
        &self.oauth_client
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    fn ensure_configured(&self) -> Result<(), InfraError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(InfraError::InvalidConfig(
                "google client id and secret are not configured".to_string(),
            ))
        }
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, InfraError> {
        self.ensure_configured()?;
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    fn token_request(&self, grant: TokenGrant) -> TokenRequest {
        TokenRequest {
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            grant,
        }
    }

    /// Trades an authorization code for a token without storing it; the
    /// caller decides when sign-in is complete.
    pub async fn exchange_code(&self, authorization_code: &str) -> Result<OAuthToken, InfraError> {
        self.ensure_configured()?;
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .request_token(self.token_request(TokenGrant::AuthorizationCode {
                code: authorization_code.trim().to_string(),
                redirect_uri: self.config.redirect_uri.clone(),
            }))
            .await?;
        Ok(self.token_from_response(response, None))
    }

    pub fn store_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        self.credential_store.save_token(token)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let stored_token = match self.credential_store.load_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(EnsureTokenResult::ReauthenticationRequired),
            Err(InfraError::Credential(message)) => {
                tracing::warn!(%message, "stored token is unreadable; sign-in required");
                return Ok(EnsureTokenResult::ReauthenticationRequired);
            }
            Err(error) => return Err(error),
        };

        if self.is_token_valid(&stored_token) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };
        if !self.config.is_configured() {
            tracing::warn!("access token expired and no client credentials are configured for refresh");
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        }

        let refreshed = self
            .oauth_client
            .request_token(self.token_request(TokenGrant::RefreshToken(refresh_token)))
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token.clone());
                self.credential_store.save_token(&token)?;
                tracing::info!(expires_at = %token.expires_at, "refreshed access token");
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(message)) => {
                tracing::warn!(%message, "token refresh rejected");
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => Err(error),
        }
    }

    pub fn clear_stored_token(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}
