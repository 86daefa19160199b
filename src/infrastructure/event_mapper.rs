use crate::domain::models::{CalendarEvent, CalendarSummary, EventCollection, EventTime};

#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleEventPayload {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
}

#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleEventsPage {
    pub summary: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    pub updated: Option<String>,
    pub items: Option<Vec<GoogleEventPayload>>,
}

#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleCalendarListPage {
    pub items: Option<Vec<GoogleCalendarListItem>>,
}

#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarListItem {
    pub id: Option<String>,
    pub summary: Option<String>,
    #[serde(rename = "summaryOverride")]
    pub summary_override: Option<String>,
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Validates one provider event. Events without an id and cancelled events
/// are skipped. Timestamps are kept as sent; the classifier decides whether
/// they are usable.
pub fn decode_event(payload: GoogleEventPayload) -> Option<CalendarEvent> {
    let id = trimmed(payload.id.as_deref())?.to_string();
    let cancelled = payload
        .status
        .as_deref()
        .map(|status| status.eq_ignore_ascii_case("cancelled"))
        .unwrap_or(false);
    if cancelled {
        return None;
    }

    Some(CalendarEvent {
        id,
        summary: payload.summary.unwrap_or_default().trim().to_string(),
        start: payload.start.unwrap_or_default(),
        end: payload.end.unwrap_or_default(),
    })
}

pub fn decode_events_page(page: GoogleEventsPage) -> EventCollection {
    let total = page.items.as_ref().map(Vec::len).unwrap_or(0);
    let items: Vec<CalendarEvent> = page
        .items
        .unwrap_or_default()
        .into_iter()
        .filter_map(decode_event)
        .collect();
    if items.len() != total {
        tracing::debug!(
            total,
            kept = items.len(),
            "skipped provider events without id or with cancelled status"
        );
    }

    EventCollection {
        summary: page.summary,
        time_zone: page.time_zone,
        updated: page.updated,
        items,
    }
}

pub fn decode_calendar_list(page: GoogleCalendarListPage) -> Vec<CalendarSummary> {
    page.items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let id = trimmed(item.id.as_deref())?.to_string();
            let summary = trimmed(item.summary_override.as_deref())
                .or(trimmed(item.summary.as_deref()))
                .unwrap_or(&id)
                .to_string();
            Some(CalendarSummary { id, summary })
        })
        .collect()
}
