use crate::application::error::DashboardError;
use crate::domain::models::{CalendarSummary, EventCollection};
use crate::infrastructure::config::RetrySettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{EventsQuery, GoogleCalendarClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u8) -> TokioDuration {
        TokioDuration::from_millis(
            self.base_delay_ms
                .saturating_mul(2u64.saturating_pow(u32::from(attempt))),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
        }
    }
}

/// Calendar access for the dashboard: a bounded readiness check plus the
/// upcoming-events read.
pub struct CalendarApi<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    client: Arc<C>,
    retry_policy: RetryPolicy,
}

impl<C> Clone for CalendarApi<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            retry_policy: self.retry_policy.clone(),
        }
    }
}

impl<C> CalendarApi<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Checks the API by listing calendars, retrying transient failures with
    /// exponential backoff. Gives up with `ApiUnavailable` once the attempts
    /// are spent instead of waiting forever.
    pub async fn wait_until_ready(&self, access_token: &str) -> Result<Vec<CalendarSummary>, DashboardError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self.client.list_calendars(access_token).await {
                Ok(calendars) => {
                    tracing::debug!(attempts = attempt + 1, "calendar api ready");
                    return Ok(calendars);
                }
                Err(error) if !is_transient(&error) => return Err(classify_failure(error)),
                Err(error) if attempt + 1 >= max_attempts => {
                    tracing::warn!(attempts = max_attempts, %error, "calendar api did not become ready");
                    return Err(DashboardError::ApiUnavailable {
                        attempts: max_attempts,
                        last_error: error.to_string(),
                    });
                }
                Err(error) => {
                    let delay = self.retry_policy.delay_for(attempt);
                    tracing::debug!(attempt = attempt + 1, ?delay, %error, "calendar api not ready; retrying");
                    sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// The next events of `calendar_id` starting at `now`, ordered by start.
    pub async fn fetch_upcoming(
        &self,
        access_token: &str,
        calendar_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EventCollection, DashboardError> {
        let collection = self
            .client
            .list_events(access_token, calendar_id, &EventsQuery::upcoming(now))
            .await
            .map_err(classify_failure)?;
        tracing::info!(calendar_id, events = collection.items.len(), "fetched upcoming events");
        Ok(collection)
    }
}

fn is_transient(error: &InfraError) -> bool {
    matches!(error, InfraError::Http(_))
}

fn classify_failure(error: InfraError) -> DashboardError {
    match error {
        InfraError::OAuth(message) => DashboardError::AuthFailure(message),
        other => DashboardError::FetchFailure(other.to_string()),
    }
}
