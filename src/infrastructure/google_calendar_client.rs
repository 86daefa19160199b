use crate::domain::models::{CalendarSummary, EventCollection};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{
    decode_calendar_list, decode_events_page, GoogleCalendarListPage, GoogleEventsPage,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use url::Url;

const CALENDAR_LIST_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/users/me/calendarList";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

pub const UPCOMING_MAX_RESULTS: u32 = 10;
pub const ORDER_BY_START_TIME: &str = "startTime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsQuery {
    pub time_min: DateTime<Utc>,
    pub show_deleted: bool,
    pub single_events: bool,
    pub max_results: u32,
    pub order_by: String,
}

impl EventsQuery {
    /// The dashboard query: the next ten single events starting from `now`.
    pub fn upcoming(now: DateTime<Utc>) -> Self {
        Self {
            time_min: now,
            show_deleted: false,
            single_events: true,
            max_results: UPCOMING_MAX_RESULTS,
            order_by: ORDER_BY_START_TIME.to_string(),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "timeMin",
                self.time_min.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("showDeleted", self.show_deleted.to_string()),
            ("singleEvents", self.single_events.to_string()),
            ("maxResults", self.max_results.to_string()),
            ("orderBy", self.order_by.clone()),
        ]
    }
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarSummary>, InfraError>;

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
    ) -> Result<EventCollection, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Http(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn api_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                InfraError::OAuth(message)
            }
            _ => InfraError::Http(message),
        }
    }

    pub fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|error| InfraError::Http(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Http("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    async fn get_body(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while listing {what}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading {what} response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarSummary>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let request = self
            .client
            .get(CALENDAR_LIST_ENDPOINT)
            .query(&[("maxResults", 250)])
            .bearer_auth(access_token);
        let body = self.get_body(request, "calendars").await?;

        let parsed: GoogleCalendarListPage = serde_json::from_str(&body).map_err(|error| {
            InfraError::Http(format!("invalid calendar list payload: {error}; body={body}"))
        })?;
        Ok(decode_calendar_list(parsed))
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
    ) -> Result<EventCollection, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let request = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .query(&query.query_pairs());
        let body = self.get_body(request, "calendar events").await?;

        let parsed: GoogleEventsPage = serde_json::from_str(&body).map_err(|error| {
            InfraError::Http(format!("invalid events list payload: {error}; body={body}"))
        })?;
        Ok(decode_events_page(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upcoming_query_matches_dashboard_contract() {
        let now = DateTime::parse_from_rfc3339("2026-02-16T10:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        let query = EventsQuery::upcoming(now);

        assert_eq!(
            query.query_pairs(),
            vec![
                ("timeMin", "2026-02-16T10:00:00.000Z".to_string()),
                ("showDeleted", "false".to_string()),
                ("singleEvents", "true".to_string()),
                ("maxResults", "10".to_string()),
                ("orderBy", "startTime".to_string()),
            ]
        );
    }

    #[test]
    fn events_endpoint_escapes_calendar_id() {
        let url = ReqwestGoogleCalendarClient::events_endpoint("team#1@group.calendar.google.com")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%231@group.calendar.google.com/events"
        );
    }

    #[test]
    fn unauthorized_responses_map_to_oauth_errors() {
        let error =
            ReqwestGoogleCalendarClient::api_http_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(matches!(error, InfraError::OAuth(_)));

        let error = ReqwestGoogleCalendarClient::api_http_error(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "try later",
        );
        assert!(matches!(error, InfraError::Http(message) if message.contains("try later")));
    }
}
