use crate::application::error::DashboardError;
use crate::application::oauth::{EnsureTokenResult, OAuthManager};
use crate::domain::models::{OAuthToken, UserProfile};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::OAuthHttpClient;

/// Sign-in state as seen by the dashboard. Being signed in only means a token
/// is stored; whether the provider still honours it is found out on fetch.
pub struct SessionGateway<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    oauth: OAuthManager<S, C>,
}

impl<S, C> Clone for SessionGateway<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            oauth: self.oauth.clone(),
        }
    }
}

impl<S, C> SessionGateway<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    pub fn new(oauth: OAuthManager<S, C>) -> Self {
        Self { oauth }
    }

    pub fn authorization_url(&self, state: &str) -> Result<String, DashboardError> {
        Ok(self.oauth.build_authorization_url(state)?)
    }

    /// Exchanges the authorization code and resolves who signed in. The token
    /// is stored only once both succeed, so a failed login leaves the user
    /// signed out. Any provider rejection surfaces as `AuthFailure`.
    pub async fn login(&self, authorization_code: &str) -> Result<(OAuthToken, UserProfile), DashboardError> {
        let token = self
            .oauth
            .exchange_code(authorization_code)
            .await
            .map_err(auth_failure)?;
        let profile = self
            .oauth
            .oauth_client()
            .fetch_profile(&token.access_token)
            .await
            .map_err(auth_failure)?;
        self.oauth.store_token(&token)?;

        tracing::info!(user = profile.display_name(), "signed in");
        Ok((token, profile))
    }

    pub fn logout(&self) -> Result<(), DashboardError> {
        self.oauth.clear_stored_token()?;
        tracing::info!("signed out");
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.oauth.credential_store().has_token()
    }

    /// A usable access token, refreshing it when expired.
    pub async fn access_token(&self) -> Result<String, DashboardError> {
        match self.oauth.ensure_access_token().await.map_err(auth_failure)? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(token.access_token)
            }
            EnsureTokenResult::ReauthenticationRequired => Err(DashboardError::SignInRequired),
        }
    }
}

fn auth_failure(error: InfraError) -> DashboardError {
    match error {
        InfraError::InvalidConfig(_) => DashboardError::Infra(error),
        other => DashboardError::AuthFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::oauth::tests::{test_config, FakeOAuthHttpClient, FakeResponse};
    use crate::application::oauth::OAuthConfig;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn gateway(
        config: OAuthConfig,
    ) -> (
        SessionGateway<InMemoryCredentialStore, FakeOAuthHttpClient>,
        Arc<InMemoryCredentialStore>,
        Arc<FakeOAuthHttpClient>,
    ) {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeOAuthHttpClient::default());
        let manager = OAuthManager::new(config, Arc::clone(&store), Arc::clone(&client));
        (SessionGateway::new(manager), store, client)
    }

    #[tokio::test]
    async fn login_stores_token_and_returns_profile() {
        let (session, store, _client) = gateway(test_config());
        assert!(!session.is_signed_in());

        let (token, profile) = session.login("auth-code").await.expect("login");

        assert_eq!(token.access_token, "fake_access");
        assert_eq!(profile.email.as_deref(), Some("fake_access@example.com"));
        assert!(session.is_signed_in());
        assert!(store.load_token().expect("load").is_some());
        assert_eq!(session.access_token().await.expect("token"), "fake_access");
    }

    #[tokio::test]
    async fn rejected_code_is_an_auth_failure() {
        let (session, _store, client) = gateway(test_config());
        client.set_exchange_response(FakeResponse::OAuthError("invalid_grant".to_string()));

        let error = session.login("bad-code").await.expect_err("login should fail");
        assert!(matches!(error, DashboardError::AuthFailure(message) if message.contains("invalid_grant")));
        assert!(!session.is_signed_in());
    }

    #[tokio::test]
    async fn failed_profile_lookup_leaves_user_signed_out() {
        let (session, store, client) = gateway(test_config());
        client.fail_profile("http 500");

        let error = session.login("auth-code").await.expect_err("profile lookup fails");

        assert!(matches!(error, DashboardError::AuthFailure(message) if message.contains("http 500")));
        assert_eq!(client.exchange_calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_signed_in());
        assert!(store.load_token().expect("load").is_none());
    }

    #[tokio::test]
    async fn logout_clears_token_and_requires_sign_in() {
        let (session, _store, _client) = gateway(test_config());
        session.login("auth-code").await.expect("login");

        session.logout().expect("logout");

        assert!(!session.is_signed_in());
        assert!(matches!(
            session.access_token().await,
            Err(DashboardError::SignInRequired)
        ));
    }

    #[test]
    fn missing_client_settings_are_a_config_error() {
        let (session, _store, _client) = gateway(OAuthConfig::default());
        assert!(matches!(
            session.authorization_url("state"),
            Err(DashboardError::Infra(InfraError::InvalidConfig(_)))
        ));
    }
}
