use crate::domain::models::{
    Buckets, CalendarEvent, ClassifiedEvent, EventState, EventTime, UrgencyTier,
};
use crate::domain::relative_time::format_relative;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_UPCOMING_LIMIT: usize = 3;

/// Which not-yet-happening events count as pending.
///
/// Ended events are dropped before this rule applies, so both rules agree on
/// every retained event; the choice only matters if that filter changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PendingRule {
    #[default]
    #[serde(rename = "start")]
    StartInFuture,
    #[serde(rename = "end")]
    EndInFuture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Timezone that defines "the same calendar day" and all-day event bounds.
    pub timezone: Tz,
    pub upcoming_limit: usize,
    pub pending_rule: PendingRule,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            upcoming_limit: DEFAULT_UPCOMING_LIMIT,
            pending_rule: PendingRule::default(),
        }
    }
}

/// Splits `events` into what is happening at `now` and what comes next today.
///
/// Pure and total: malformed, ended and other-day events are dropped, never
/// reported as errors. Provider order is kept within each bucket and only the
/// first `upcoming_limit` pending events are returned.
pub fn classify(events: &[CalendarEvent], now: DateTime<Utc>, options: &ClassifyOptions) -> Buckets {
    let mut buckets = Buckets::default();

    for classified in events
        .iter()
        .filter_map(|event| classify_event(event, now, options))
    {
        match classified.state {
            EventState::HappeningNow => buckets.current.push(classified),
            EventState::Pending => buckets.upcoming.push(classified),
        }
    }

    buckets.upcoming.truncate(options.upcoming_limit);
    buckets
}

pub fn classify_event(
    event: &CalendarEvent,
    now: DateTime<Utc>,
    options: &ClassifyOptions,
) -> Option<ClassifiedEvent> {
    let (Some(starts_at), Some(ends_at)) = (
        parse_event_time(&event.start, options.timezone),
        parse_event_time(&event.end, options.timezone),
    ) else {
        tracing::debug!(event_id = %event.id, "dropping event with missing or unparseable timestamps");
        return None;
    };

    if ends_at < starts_at {
        tracing::debug!(event_id = %event.id, "dropping event that ends before it starts");
        return None;
    }
    if ends_at <= now {
        return None;
    }
    if starts_at.with_timezone(&options.timezone).date_naive()
        != now.with_timezone(&options.timezone).date_naive()
    {
        return None;
    }

    let happening_now = starts_at <= now && now < ends_at;
    let pending = !happening_now
        && match options.pending_rule {
            PendingRule::StartInFuture => starts_at > now,
            PendingRule::EndInFuture => ends_at > now,
        };

    let (state, seconds_remaining) = if happening_now {
        (EventState::HappeningNow, (ends_at - now).num_seconds())
    } else if pending {
        (EventState::Pending, (starts_at - now).num_seconds())
    } else {
        return None;
    };

    Some(ClassifiedEvent {
        event: event.clone(),
        starts_at,
        ends_at,
        state,
        seconds_remaining,
        relative_label: format_relative(starts_at, now),
        urgency: UrgencyTier::from_seconds_remaining(seconds_remaining),
    })
}

/// Resolves a provider start/end to an instant. All-day dates resolve to
/// local midnight in `timezone`.
pub fn parse_event_time(time: &EventTime, timezone: Tz) -> Option<DateTime<Utc>> {
    if let Some(raw) = time.date_time.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        return DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|value| value.with_timezone(&Utc));
    }

    let raw = time.date.as_deref().map(str::trim).filter(|raw| !raw.is_empty())?;
    let midnight = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)?;
    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}
