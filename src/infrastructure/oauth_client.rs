use crate::domain::models::UserProfile;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// What the token endpoint is asked to trade for an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken(String),
}

impl TokenGrant {
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::RefreshToken(_))
    }

    fn into_form(self) -> Vec<(&'static str, String)> {
        match self {
            Self::AuthorizationCode { code, redirect_uri } => vec![
                ("grant_type", "authorization_code".to_string()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ],
            Self::RefreshToken(refresh_token) => vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant: TokenGrant,
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Google's token and userinfo endpoints. Transport failures are `Http`;
/// anything the provider answered with is `OAuth`.
#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn request_token(&self, request: TokenRequest) -> Result<OAuthTokenResponse, InfraError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, InfraError>;
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenPayload {
    fn into_response(self, status: StatusCode) -> Result<OAuthTokenResponse, InfraError> {
        if let Some(code) = self.error {
            let detail = self.error_description.unwrap_or_default();
            return Err(InfraError::OAuth(format!("token endpoint rejected the grant: {code} {detail}")));
        }
        if !status.is_success() || self.access_token.trim().is_empty() {
            return Err(InfraError::OAuth(format!(
                "token endpoint returned no access token (http {})",
                status.as_u16()
            )));
        }
        Ok(OAuthTokenResponse {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in.unwrap_or(0).max(0),
            token_type: self.token_type,
            scope: self.scope,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoPayload {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<(StatusCode, String), InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("{endpoint} request failed: {error}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("{endpoint} response unreadable: {error}")))?;
        Ok((status, body))
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, status: StatusCode, body: &str) -> Result<T, InfraError> {
    serde_json::from_str(body).map_err(|error| {
        InfraError::OAuth(format!(
            "{endpoint} returned an unexpected payload (http {}): {error}",
            status.as_u16()
        ))
    })
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn request_token(&self, request: TokenRequest) -> Result<OAuthTokenResponse, InfraError> {
        tracing::debug!(refresh = request.grant.is_refresh(), "requesting oauth token");
        let mut form = vec![
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
        ];
        form.extend(request.grant.into_form());

        let http = self.client.post(&request.token_endpoint).form(&form);
        let (status, body) = self.send(http, "token endpoint").await?;
        decode::<TokenPayload>("token endpoint", status, &body)?.into_response(status)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, InfraError> {
        let http = self.client.get(USERINFO_ENDPOINT).bearer_auth(access_token);
        let (status, body) = self.send(http, "userinfo endpoint").await?;
        if !status.is_success() {
            return Err(InfraError::OAuth(format!(
                "userinfo endpoint refused the token (http {})",
                status.as_u16()
            )));
        }
        let payload: UserInfoPayload = decode("userinfo endpoint", status, &body)?;
        Ok(UserProfile {
            name: payload.name,
            email: payload.email,
        })
    }
}
