use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Start or end of a provider event. Timed events carry `date_time`
/// (RFC 3339); all-day events carry `date` (`YYYY-MM-DD`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EventTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn at(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: None,
        }
    }

    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date_time: None,
            date: Some(date.into()),
            time_zone: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
}

impl CalendarEvent {
    pub fn display_title(&self) -> &str {
        let summary = self.summary.trim();
        if summary.is_empty() {
            "(no title)"
        } else {
            summary
        }
    }
}

/// One calendar query's result, in provider order (start time ascending).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EventCollection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
}

impl EventCollection {
    pub fn from_items(items: Vec<CalendarEvent>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarSummary {
    pub id: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        non_blank(&self.name)
            .or_else(|| non_blank(&self.email))
            .unwrap_or("unknown user")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    HappeningNow,
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Imminent,
    Soon,
    Normal,
}

impl UrgencyTier {
    pub const IMMINENT_SECONDS: i64 = 5 * 60;
    pub const SOON_SECONDS: i64 = 60 * 60;

    pub fn from_seconds_remaining(seconds_remaining: i64) -> Self {
        if seconds_remaining < Self::IMMINENT_SECONDS {
            Self::Imminent
        } else if seconds_remaining < Self::SOON_SECONDS {
            Self::Soon
        } else {
            Self::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imminent => "imminent",
            Self::Soon => "soon",
            Self::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub event: CalendarEvent,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub state: EventState,
    pub seconds_remaining: i64,
    pub relative_label: String,
    pub urgency: UrgencyTier,
}

impl ClassifiedEvent {
    pub fn happening_now(&self) -> bool {
        self.state == EventState::HappeningNow
    }

    pub fn pending(&self) -> bool {
        self.state == EventState::Pending
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Buckets {
    pub current: Vec<ClassifiedEvent>,
    pub upcoming: Vec<ClassifiedEvent>,
}

impl Buckets {
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.upcoming.is_empty()
    }
}
