use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_api::{CalendarApi, RetryPolicy};
use crate::application::clock::Clock;
use crate::application::dashboard::{render_dashboard, Dashboard, CURRENT_EVENTS_KEY};
use crate::application::error::DashboardError;
use crate::application::oauth::{OAuthConfig, OAuthManager, DEFAULT_REDIRECT_URI};
use crate::application::refresh::RefreshController;
use crate::application::session::SessionGateway;
use crate::domain::classifier::classify;
use crate::domain::models::{CalendarSummary, EventCollection};
use crate::infrastructure::config::{save_default_calendar_id, AppConfig, TokenBackend};
use crate::infrastructure::credential_store::{
    ConfiguredCredentialStore, KeyringCredentialStore, StorageCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ReqwestGoogleCalendarClient};
use crate::infrastructure::key_value_store::SqliteKeyValueStore;
use crate::infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
use crate::infrastructure::persistent_cache::PersistentCache;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval};

const CLIENT_ID_KEYS: [&str; 2] = ["NOWCAL_GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"];
const CLIENT_SECRET_KEYS: [&str; 2] = ["NOWCAL_GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"];
const REDIRECT_URI_KEYS: [&str; 2] = ["NOWCAL_GOOGLE_REDIRECT_URI", "GOOGLE_REDIRECT_URI"];

pub type AppCredentialStore = ConfiguredCredentialStore<SqliteKeyValueStore>;
pub type AppSession = SessionGateway<AppCredentialStore, dyn OAuthHttpClient>;

/// Network-facing collaborators. Production uses the reqwest clients and
/// OAuth settings from the environment.
pub struct AppServices {
    pub oauth_config: OAuthConfig,
    pub oauth_client: Arc<dyn OAuthHttpClient>,
    pub calendar_client: Arc<dyn GoogleCalendarClient>,
}

impl AppServices {
    pub fn from_env() -> Self {
        let oauth_config = match load_oauth_config_from_env() {
            Ok(config) => config,
            Err(error) => {
                tracing::debug!(%error, "oauth client settings unavailable");
                OAuthConfig::default()
            }
        };
        Self {
            oauth_config,
            oauth_client: Arc::new(ReqwestOAuthClient::new()),
            calendar_client: Arc::new(ReqwestGoogleCalendarClient::new()),
        }
    }
}

pub struct AppState {
    config_dir: PathBuf,
    config: AppConfig,
    store: Arc<SqliteKeyValueStore>,
    credential_store: Arc<AppCredentialStore>,
    services: AppServices,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_services(workspace_root, AppServices::from_env())
    }

    pub fn with_services(workspace_root: PathBuf, services: AppServices) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        let credential_store = Arc::new(match bootstrap.config.token_backend {
            TokenBackend::Storage => {
                ConfiguredCredentialStore::Storage(StorageCredentialStore::new(Arc::clone(&store)))
            }
            TokenBackend::Keyring => ConfiguredCredentialStore::Keyring(KeyringCredentialStore::default()),
        });

        Ok(Self {
            config_dir: bootstrap.config_dir,
            config: bootstrap.config,
            store,
            credential_store,
            services,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn cache(&self) -> PersistentCache<SqliteKeyValueStore> {
        PersistentCache::new(Arc::clone(&self.store))
    }

    pub fn session(&self) -> AppSession {
        let manager = OAuthManager::new(
            self.services.oauth_config.clone(),
            Arc::clone(&self.credential_store),
            Arc::clone(&self.services.oauth_client),
        );
        SessionGateway::new(manager)
    }

    pub fn calendar_api(&self) -> CalendarApi<dyn GoogleCalendarClient> {
        CalendarApi::new(Arc::clone(&self.services.calendar_client))
            .with_retry_policy(RetryPolicy::from(self.config.api_retry.clone()))
    }

    pub fn dashboard(&self) -> Result<Dashboard<SqliteKeyValueStore>, DashboardError> {
        Ok(Dashboard::new(self.cache(), self.config.classify_options()?))
    }

    /// An explicit id wins over `defaultCalendarId` from `app.json`.
    pub fn resolve_calendar_id(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| self.config.default_calendar_id().map(str::to_string))
    }

    fn require_oauth_client(&self) -> Result<(), DashboardError> {
        if self.services.oauth_config.is_configured() {
            return Ok(());
        }
        Err(InfraError::InvalidConfig(format!(
            "google oauth client is not configured (set one of: {} and one of: {})",
            CLIENT_ID_KEYS.join(", "),
            CLIENT_SECRET_KEYS.join(", ")
        ))
        .into())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: String,
    pub email: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub signed_in: bool,
    pub oauth_client_configured: bool,
    pub token_backend: TokenBackend,
    pub timezone: String,
    pub default_calendar_id: Option<String>,
    pub snapshot_stored: bool,
    pub cached_events: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    pub calendar_id: String,
    pub fetched: usize,
    pub happening_now: usize,
    pub upcoming: usize,
}

pub fn auth_url_impl(state: &AppState) -> Result<String, DashboardError> {
    state.require_oauth_client()?;
    let auth_state = format!("nowcal-{}", Utc::now().timestamp_micros());
    state.session().authorization_url(&auth_state)
}

pub async fn login_impl(state: &AppState, authorization_code: String) -> Result<LoginResponse, DashboardError> {
    state.require_oauth_client()?;
    let (token, profile) = state.session().login(&authorization_code).await?;
    Ok(LoginResponse {
        user: profile.display_name().to_string(),
        email: profile.email,
        expires_at: token.expires_at.to_rfc3339(),
    })
}

pub fn logout_impl(state: &AppState) -> Result<(), DashboardError> {
    state.session().logout()
}

pub fn status_impl(state: &AppState) -> Result<StatusResponse, DashboardError> {
    let cache = state.cache();
    let snapshot_stored = cache.contains(CURRENT_EVENTS_KEY);
    let cached_events = if snapshot_stored {
        cache.load(CURRENT_EVENTS_KEY, EventCollection::default()).items.len()
    } else {
        0
    };
    Ok(StatusResponse {
        signed_in: state.session().is_signed_in(),
        oauth_client_configured: state.services.oauth_config.is_configured(),
        token_backend: state.config.token_backend,
        timezone: state.config.timezone.clone(),
        default_calendar_id: state.config.default_calendar_id().map(str::to_string),
        snapshot_stored,
        cached_events,
    })
}

pub async fn list_calendars_impl(state: &AppState) -> Result<Vec<CalendarSummary>, DashboardError> {
    let access_token = state.session().access_token().await?;
    state.calendar_api().wait_until_ready(&access_token).await
}

/// One-shot fetch: stores the snapshot and remembers an explicitly chosen
/// calendar as the default.
pub async fn fetch_events_impl(
    state: &AppState,
    calendar_id: Option<String>,
) -> Result<FetchResponse, DashboardError> {
    let explicit = calendar_id.is_some();
    let calendar_id = state
        .resolve_calendar_id(calendar_id)
        .ok_or(DashboardError::NoCalendarSelected)?;
    let access_token = state.session().access_token().await?;
    let now = Utc::now();

    let collection = state
        .calendar_api()
        .fetch_upcoming(&access_token, &calendar_id, now)
        .await?;
    state.cache().save(CURRENT_EVENTS_KEY, &collection)?;
    if explicit && state.config.default_calendar_id() != Some(calendar_id.as_str()) {
        save_default_calendar_id(state.config_dir(), &calendar_id)?;
    }

    let buckets = classify(&collection.items, now, &state.config.classify_options()?);
    Ok(FetchResponse {
        calendar_id,
        fetched: collection.items.len(),
        happening_now: buckets.current.len(),
        upcoming: buckets.upcoming.len(),
    })
}

/// Renders the cached snapshot once without touching the network.
pub fn show_impl(state: &AppState, now: DateTime<Utc>) -> Result<String, DashboardError> {
    let signed_in = state.session().is_signed_in();
    let mut dashboard = state.dashboard()?;
    dashboard.set_signed_in(signed_in);
    dashboard.set_fetch_enabled(signed_in);
    dashboard.set_calendar_id(state.resolve_calendar_id(None));
    Ok(render_dashboard(&dashboard.view(now)))
}

/// Live dashboard: redraws on every clock tick and applies fetch results as
/// they complete, until Ctrl-C.
pub async fn watch_impl(
    state: &AppState,
    calendar_id: Option<String>,
    refresh_on_start: bool,
) -> Result<(), DashboardError> {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    watch_until(state, calendar_id, refresh_on_start, ctrl_c, draw_to_terminal).await
}

async fn watch_until<F, D>(
    state: &AppState,
    calendar_id: Option<String>,
    refresh_on_start: bool,
    shutdown: F,
    mut sink: D,
) -> Result<(), DashboardError>
where
    F: Future<Output = ()>,
    D: FnMut(&str) -> Result<(), InfraError>,
{
    let session = state.session();
    let signed_in = session.is_signed_in();
    let mut dashboard = state.dashboard()?;
    dashboard.set_signed_in(signed_in);
    dashboard.set_calendar_id(state.resolve_calendar_id(calendar_id));

    let mut event_loop = WatchLoop {
        session,
        api: state.calendar_api(),
        dashboard,
        signed_in,
        refresh: RefreshController::new(),
        refresh_timer: state
            .config
            .refresh_interval()
            .map(|period| tokio::time::interval_at(Instant::now() + period, period)),
        readiness: None,
        refresh_pending: refresh_on_start,
    };

    let mut clock = Clock::new(state.config.tick_interval());
    let ticks = clock.subscribe();
    clock.start();
    if signed_in {
        event_loop.check_readiness();
    }

    let outcome = event_loop.run(&clock, ticks, shutdown, &mut sink).await;
    event_loop.stop();
    clock.stop().await;
    outcome
}

type ReadinessCheck = JoinHandle<Result<(), DashboardError>>;

/// Event loop state for `watch`. Fetching stays off until a readiness check
/// succeeds; while it is off, every refresh request starts a new check.
struct WatchLoop {
    session: AppSession,
    api: CalendarApi<dyn GoogleCalendarClient>,
    dashboard: Dashboard<SqliteKeyValueStore>,
    signed_in: bool,
    refresh: RefreshController,
    refresh_timer: Option<Interval>,
    readiness: Option<ReadinessCheck>,
    refresh_pending: bool,
}

impl WatchLoop {
    async fn run<F, D>(
        &mut self,
        clock: &Clock,
        mut ticks: watch::Receiver<DateTime<Utc>>,
        shutdown: F,
        sink: &mut D,
    ) -> Result<(), DashboardError>
    where
        F: Future<Output = ()>,
        D: FnMut(&str) -> Result<(), InfraError>,
    {
        tokio::pin!(shutdown);
        self.draw(clock.now(), sink)?;

        loop {
            tokio::select! {
                changed = ticks.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let now = *ticks.borrow_and_update();
                    self.draw(now, sink)?;
                }
                Some(outcome) = self.refresh.next_completion() => {
                    self.dashboard.set_refreshing(false);
                    match outcome.result {
                        Ok(collection) => self.dashboard.apply_fetch(collection),
                        Err(error) => self.dashboard.record_error(&error),
                    }
                    self.draw(clock.now(), sink)?;
                }
                checked = next_readiness(&mut self.readiness) => {
                    self.readiness = None;
                    self.readiness_finished(checked, clock.now());
                    self.draw(clock.now(), sink)?;
                }
                _ = next_refresh(&mut self.refresh_timer) => {
                    self.refresh_requested(clock.now());
                    self.draw(clock.now(), sink)?;
                }
                () = &mut shutdown => {
                    tracing::info!("stopping dashboard");
                    return Ok(());
                }
            }
        }
    }

    fn draw<D>(&self, now: DateTime<Utc>, sink: &mut D) -> Result<(), InfraError>
    where
        D: FnMut(&str) -> Result<(), InfraError>,
    {
        sink(&render_dashboard(&self.dashboard.view(now)))
    }

    fn check_readiness(&mut self) {
        if self.readiness.is_some() {
            return;
        }
        let session = self.session.clone();
        let api = self.api.clone();
        self.readiness = Some(tokio::spawn(async move {
            let access_token = session.access_token().await?;
            api.wait_until_ready(&access_token).await.map(|_| ())
        }));
    }

    fn readiness_finished(&mut self, checked: Result<Result<(), DashboardError>, JoinError>, now: DateTime<Utc>) {
        let ready = checked.unwrap_or_else(|error| {
            Err(DashboardError::FetchFailure(format!("readiness check aborted: {error}")))
        });
        match ready {
            Ok(()) => {
                tracing::info!("calendar api ready; fetching enabled");
                self.dashboard.set_fetch_enabled(true);
                if std::mem::take(&mut self.refresh_pending) {
                    self.request_refresh(now);
                }
            }
            Err(error) => {
                self.dashboard.set_fetch_enabled(false);
                self.dashboard.record_error(&error);
            }
        }
    }

    fn refresh_requested(&mut self, now: DateTime<Utc>) {
        if self.dashboard.fetch_enabled() {
            self.request_refresh(now);
        } else if self.signed_in {
            self.refresh_pending = true;
            self.check_readiness();
        } else {
            tracing::debug!("signed out; refresh skipped");
        }
    }

    fn request_refresh(&mut self, now: DateTime<Utc>) {
        let Some(calendar_id) = self.dashboard.calendar_id().map(str::to_string) else {
            self.dashboard.record_error(&DashboardError::NoCalendarSelected);
            return;
        };

        let session = self.session.clone();
        let api = self.api.clone();
        let target = calendar_id.clone();
        self.refresh.issue(calendar_id, async move {
            let access_token = session.access_token().await?;
            api.fetch_upcoming(&access_token, &target, now).await
        });
        self.dashboard.set_refreshing(true);
    }

    fn stop(&mut self) {
        self.refresh.shutdown();
        if let Some(check) = self.readiness.take() {
            check.abort();
        }
    }
}

async fn next_readiness(check: &mut Option<ReadinessCheck>) -> Result<Result<(), DashboardError>, JoinError> {
    match check {
        Some(check) => check.await,
        None => std::future::pending().await,
    }
}

async fn next_refresh(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn draw_to_terminal(frame: &str) -> Result<(), InfraError> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\x1b[2J\x1b[H{frame}")?;
    stdout.flush()?;
    Ok(())
}

fn load_oauth_config_from_env() -> Result<OAuthConfig, InfraError> {
    load_oauth_config_from_lookup(|key| std::env::var(key).ok())
}

fn load_oauth_config_from_lookup<F>(lookup: F) -> Result<OAuthConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = required_lookup_value(&lookup, &CLIENT_ID_KEYS, "google client id")?;
    let client_secret = required_lookup_value(&lookup, &CLIENT_SECRET_KEYS, "google client secret")?;
    let redirect_uri = optional_lookup_value(&lookup, &REDIRECT_URI_KEYS)
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

    Ok(OAuthConfig::new(
        client_id,
        client_secret,
        redirect_uri,
        OAuthConfig::default_scopes(),
    ))
}

fn required_lookup_value<F>(lookup: &F, keys: &[&str], field_name: &str) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bootstrap::tests::TempWorkspace;
    use crate::application::calendar_api::tests::{sample_collection, FakeCalendarClient};
    use crate::application::oauth::tests::{test_config, FakeOAuthHttpClient};
    use crate::domain::models::OAuthToken;
    use crate::infrastructure::config::{load_app_config, RetrySettings, APP_JSON};
    use crate::infrastructure::credential_store::CredentialStore;
    use chrono::Duration;
    use std::sync::atomic::Ordering;

    struct Harness {
        workspace: TempWorkspace,
        calendar_client: Arc<FakeCalendarClient>,
        oauth_client: Arc<FakeOAuthHttpClient>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                workspace: TempWorkspace::new("commands"),
                calendar_client: Arc::new(FakeCalendarClient::default()),
                oauth_client: Arc::new(FakeOAuthHttpClient::default()),
            }
        }

        fn state_with(&self, oauth_config: OAuthConfig) -> AppState {
            let services = AppServices {
                oauth_config,
                oauth_client: self.oauth_client.clone(),
                calendar_client: self.calendar_client.clone(),
            };
            AppState::with_services(self.workspace.path.clone(), services).expect("initialize app state")
        }

        fn state(&self) -> AppState {
            self.state_with(test_config())
        }
    }

    fn write_watch_config(harness: &Harness, refresh_interval_seconds: u64, retry: RetrySettings) {
        let config = AppConfig {
            refresh_interval_seconds,
            default_calendar_id: Some("primary".to_string()),
            api_retry: retry,
            ..AppConfig::default()
        };
        let config_dir = harness.workspace.path.join("config");
        std::fs::create_dir_all(&config_dir).expect("create config dir");
        std::fs::write(
            config_dir.join(APP_JSON),
            serde_json::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
    }

    async fn watch_for(state: &AppState, refresh_on_start: bool, run_for: std::time::Duration) -> Vec<String> {
        let mut frames = Vec::new();
        watch_until(
            state,
            None,
            refresh_on_start,
            tokio::time::sleep(run_for),
            |frame: &str| {
                frames.push(frame.to_string());
                Ok(())
            },
        )
        .await
        .expect("watch loop");
        frames
    }

    fn store_valid_token(state: &AppState) {
        state
            .credential_store
            .save_token(&OAuthToken {
                access_token: "stored-access".to_string(),
                refresh_token: Some("stored-refresh".to_string()),
                expires_at: Utc::now() + Duration::hours(1),
                token_type: "Bearer".to_string(),
                scope: None,
            })
            .expect("save token");
    }

    #[test]
    fn oauth_config_validation_reports_missing_client_id() {
        let result = load_oauth_config_from_lookup(|key| match key {
            "NOWCAL_GOOGLE_CLIENT_SECRET" => Some("secret".to_string()),
            _ => None,
        });
        match result {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("google client id"));
            }
            _ => panic!("expected invalid config error"),
        }
    }

    #[test]
    fn oauth_config_prefers_prefixed_keys_and_defaults_redirect() {
        let config = load_oauth_config_from_lookup(|key| match key {
            "NOWCAL_GOOGLE_CLIENT_ID" => Some(" nowcal-id ".to_string()),
            "GOOGLE_CLIENT_ID" => Some("generic-id".to_string()),
            "NOWCAL_GOOGLE_CLIENT_SECRET" => Some("  ".to_string()),
            "GOOGLE_CLIENT_SECRET" => Some("generic-secret".to_string()),
            _ => None,
        })
        .expect("config");

        assert_eq!(config.client_id, "nowcal-id");
        assert_eq!(config.client_secret, "generic-secret");
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.scopes, OAuthConfig::default_scopes());
    }

    #[test]
    fn fresh_workspace_is_signed_out_with_empty_snapshot() {
        let harness = Harness::new();
        let status = status_impl(&harness.state()).expect("status");

        assert!(!status.signed_in);
        assert!(status.oauth_client_configured);
        assert_eq!(status.token_backend, TokenBackend::Storage);
        assert!(!status.snapshot_stored);
        assert_eq!(status.cached_events, 0);
        assert_eq!(status.default_calendar_id, None);
    }

    #[test]
    fn auth_url_requires_oauth_client_settings() {
        let harness = Harness::new();
        let state = harness.state_with(OAuthConfig::default());

        let error = auth_url_impl(&state).expect_err("missing settings");
        assert!(matches!(
            error,
            DashboardError::Infra(InfraError::InvalidConfig(message)) if message.contains("NOWCAL_GOOGLE_CLIENT_ID")
        ));

        let url = auth_url_impl(&harness.state()).expect("auth url");
        assert!(url.contains("calendar.readonly"));
    }

    #[tokio::test]
    async fn login_then_logout_round_trip() {
        let harness = Harness::new();
        let state = harness.state();

        let login = login_impl(&state, "auth-code".to_string()).await.expect("login");
        assert_eq!(login.user, "Ada Lovelace");
        assert!(status_impl(&state).expect("status").signed_in);

        logout_impl(&state).expect("logout");
        assert!(!status_impl(&state).expect("status").signed_in);
    }

    #[tokio::test]
    async fn fetch_requires_sign_in() {
        let harness = Harness::new();
        let state = harness.state();

        let error = fetch_events_impl(&state, Some("primary".to_string()))
            .await
            .expect_err("not signed in");
        assert!(matches!(error, DashboardError::SignInRequired));
        assert_eq!(harness.calendar_client.event_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_requires_a_calendar() {
        let harness = Harness::new();
        let state = harness.state();
        store_valid_token(&state);

        let error = fetch_events_impl(&state, None).await.expect_err("no calendar");
        assert!(matches!(error, DashboardError::NoCalendarSelected));
    }

    #[tokio::test]
    async fn fetch_stores_snapshot_and_remembers_calendar() {
        let harness = Harness::new();
        let state = harness.state();
        store_valid_token(&state);
        harness.calendar_client.push_events(Ok(sample_collection()));

        let response = fetch_events_impl(&state, Some("team@example.com".to_string()))
            .await
            .expect("fetch");

        assert_eq!(response.calendar_id, "team@example.com");
        assert_eq!(response.fetched, 1);
        let cached = state.cache().load(CURRENT_EVENTS_KEY, EventCollection::default());
        assert_eq!(cached, sample_collection());
        let config = load_app_config(state.config_dir()).expect("load config");
        assert_eq!(config.default_calendar_id(), Some("team@example.com"));

        let reopened = harness.state();
        let status = status_impl(&reopened).expect("status");
        assert!(status.snapshot_stored);
        assert_eq!(status.cached_events, 1);
        assert_eq!(
            reopened.resolve_calendar_id(None).as_deref(),
            Some("team@example.com")
        );
    }

    #[tokio::test]
    async fn fetch_failure_keeps_previous_snapshot() {
        let harness = Harness::new();
        let state = harness.state();
        store_valid_token(&state);
        harness.calendar_client.push_events(Ok(sample_collection()));
        fetch_events_impl(&state, Some("primary".to_string()))
            .await
            .expect("first fetch");

        harness
            .calendar_client
            .push_events(Err(InfraError::Http("http 500".to_string())));
        let error = fetch_events_impl(&state, Some("primary".to_string()))
            .await
            .expect_err("second fetch");

        assert!(matches!(error, DashboardError::FetchFailure(_)));
        let cached = state.cache().load(CURRENT_EVENTS_KEY, EventCollection::default());
        assert_eq!(cached, sample_collection());
    }

    #[tokio::test]
    async fn list_calendars_checks_api_readiness() {
        let harness = Harness::new();
        let state = harness.state();
        store_valid_token(&state);
        harness.calendar_client.push_calendars(Ok(vec![CalendarSummary {
            id: "primary".to_string(),
            summary: "Ada".to_string(),
        }]));

        let calendars = list_calendars_impl(&state).await.expect("calendars");
        assert_eq!(calendars.len(), 1);
        assert_eq!(harness.calendar_client.calendar_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn show_renders_cached_snapshot() {
        let harness = Harness::new();
        let state = harness.state();
        store_valid_token(&state);
        harness.calendar_client.push_events(Ok(sample_collection()));
        fetch_events_impl(&state, Some("primary".to_string()))
            .await
            .expect("fetch");

        let now = DateTime::parse_from_rfc3339("2026-02-16T10:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        let rendered = show_impl(&harness.state(), now).expect("show");

        assert!(rendered.contains("signed in | calendar: primary"));
        assert!(rendered.contains("Design review  (in 30 minutes)"));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_fetches_on_start_and_redraws_each_tick() {
        let harness = Harness::new();
        write_watch_config(&harness, 0, RetrySettings::default());
        let state = harness.state();
        store_valid_token(&state);
        harness.calendar_client.push_events(Ok(sample_collection()));

        let frames = watch_for(&state, true, std::time::Duration::from_secs(5)).await;

        assert!(frames.len() >= 5, "one frame per tick, got {}", frames.len());
        assert!(frames[0].contains("fetch disabled"));
        let last = frames.last().expect("frames drawn");
        assert!(!last.contains("fetch disabled"));
        assert!(!last.contains("error:"));
        assert_eq!(harness.calendar_client.calendar_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.calendar_client.event_calls.load(Ordering::SeqCst), 1);
        let cached = state.cache().load(CURRENT_EVENTS_KEY, EventCollection::default());
        assert_eq!(cached, sample_collection());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_retries_readiness_after_api_was_unavailable() {
        let harness = Harness::new();
        write_watch_config(
            &harness,
            60,
            RetrySettings {
                max_attempts: 1,
                base_delay_ms: 10,
            },
        );
        let state = harness.state();
        store_valid_token(&state);
        harness
            .calendar_client
            .push_calendars(Err(InfraError::Http("http 503".to_string())));
        harness.calendar_client.push_events(Ok(sample_collection()));

        let frames = watch_for(&state, false, std::time::Duration::from_secs(90)).await;

        assert!(frames
            .iter()
            .any(|frame| frame.contains("calendar API unavailable after 1 attempt(s)")));
        assert_eq!(harness.calendar_client.calendar_calls.load(Ordering::SeqCst), 2);
        assert_eq!(harness.calendar_client.event_calls.load(Ordering::SeqCst), 1);
        let last = frames.last().expect("frames drawn");
        assert!(!last.contains("fetch disabled"));
        assert!(!last.contains("error:"));
        let cached = state.cache().load(CURRENT_EVENTS_KEY, EventCollection::default());
        assert_eq!(cached, sample_collection());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_stops_while_readiness_check_is_backing_off() {
        let harness = Harness::new();
        write_watch_config(
            &harness,
            0,
            RetrySettings {
                max_attempts: 5,
                base_delay_ms: 1_000,
            },
        );
        let state = harness.state();
        store_valid_token(&state);
        for _ in 0..5 {
            harness
                .calendar_client
                .push_calendars(Err(InfraError::Http("http 503".to_string())));
        }

        let frames = watch_for(&state, true, std::time::Duration::from_millis(1_500)).await;

        assert!(!frames.is_empty());
        assert!(frames.iter().all(|frame| frame.contains("fetch disabled")));
        assert!(harness.calendar_client.calendar_calls.load(Ordering::SeqCst) < 5);
        assert_eq!(harness.calendar_client.event_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_signed_out_never_touches_the_api() {
        let harness = Harness::new();
        write_watch_config(&harness, 1, RetrySettings::default());
        let state = harness.state();

        let frames = watch_for(&state, true, std::time::Duration::from_secs(3)).await;

        assert!(frames.iter().all(|frame| frame.contains("signed out")));
        assert_eq!(harness.calendar_client.calendar_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.calendar_client.event_calls.load(Ordering::SeqCst), 0);
    }
}
