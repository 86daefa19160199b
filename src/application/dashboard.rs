use crate::application::error::DashboardError;
use crate::domain::classifier::{classify, ClassifyOptions};
use crate::domain::models::{Buckets, ClassifiedEvent, EventCollection};
use crate::infrastructure::key_value_store::KeyValueStore;
use crate::infrastructure::persistent_cache::PersistentCache;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Write as _;

pub const CURRENT_EVENTS_KEY: &str = "current_events";

/// State behind the terminal view. The event collection starts from the cached
/// snapshot and is only replaced by a completed fetch.
pub struct Dashboard<S>
where
    S: KeyValueStore,
{
    cache: PersistentCache<S>,
    options: ClassifyOptions,
    events: EventCollection,
    calendar_id: Option<String>,
    signed_in: bool,
    fetch_enabled: bool,
    refreshing: bool,
    last_error: Option<String>,
}

impl<S> Dashboard<S>
where
    S: KeyValueStore,
{
    pub fn new(cache: PersistentCache<S>, options: ClassifyOptions) -> Self {
        let events = cache.load(CURRENT_EVENTS_KEY, EventCollection::default());
        tracing::debug!(events = events.items.len(), "loaded cached event snapshot");
        Self {
            cache,
            options,
            events,
            calendar_id: None,
            signed_in: false,
            fetch_enabled: false,
            refreshing: false,
            last_error: None,
        }
    }

    pub fn events(&self) -> &EventCollection {
        &self.events
    }

    pub fn calendar_id(&self) -> Option<&str> {
        self.calendar_id.as_deref()
    }

    pub fn set_calendar_id(&mut self, calendar_id: Option<String>) {
        self.calendar_id = calendar_id;
    }

    pub fn set_signed_in(&mut self, signed_in: bool) {
        self.signed_in = signed_in;
    }

    pub fn fetch_enabled(&self) -> bool {
        self.fetch_enabled
    }

    pub fn set_fetch_enabled(&mut self, enabled: bool) {
        self.fetch_enabled = enabled;
    }

    pub fn set_refreshing(&mut self, refreshing: bool) {
        self.refreshing = refreshing;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replaces the collection and writes it through to the snapshot slot.
    /// A failed write is reported in the error slot; the fresh events are
    /// still shown.
    pub fn apply_fetch(&mut self, collection: EventCollection) {
        self.last_error = None;
        if let Err(error) = self.cache.save(CURRENT_EVENTS_KEY, &collection) {
            tracing::error!(%error, "failed to persist event snapshot");
            self.last_error = Some(DashboardError::from(error).to_string());
        }
        self.events = collection;
    }

    /// Overwrites the single error slot.
    pub fn record_error(&mut self, error: &DashboardError) {
        tracing::warn!(%error, "dashboard error");
        self.last_error = Some(error.to_string());
    }

    pub fn buckets(&self, now: DateTime<Utc>) -> Buckets {
        classify(&self.events.items, now, &self.options)
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView<'_> {
        DashboardView {
            now,
            timezone: self.options.timezone,
            buckets: self.buckets(now),
            calendar_id: self.calendar_id.as_deref(),
            signed_in: self.signed_in,
            fetch_enabled: self.fetch_enabled,
            refreshing: self.refreshing,
            last_error: self.last_error.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardView<'a> {
    pub now: DateTime<Utc>,
    pub timezone: Tz,
    pub buckets: Buckets,
    pub calendar_id: Option<&'a str>,
    pub signed_in: bool,
    pub fetch_enabled: bool,
    pub refreshing: bool,
    pub last_error: Option<&'a str>,
}

pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let mut out = String::new();
    let local_now = view.now.with_timezone(&view.timezone);
    let _ = writeln!(out, "nowcal  {}  ({})", local_now.format("%a %Y-%m-%d %H:%M:%S"), view.timezone);

    let mut status = vec![if view.signed_in { "signed in" } else { "signed out" }.to_string()];
    status.push(format!("calendar: {}", view.calendar_id.unwrap_or("none")));
    if !view.fetch_enabled {
        status.push("fetch disabled".to_string());
    }
    if view.refreshing {
        status.push("refreshing...".to_string());
    }
    let _ = writeln!(out, "{}", status.join(" | "));

    if let Some(error) = view.last_error {
        let _ = writeln!(out, "error: {error}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Happening now");
    render_section(&mut out, &view.buckets.current, view.timezone, "nothing right now");

    let _ = writeln!(out);
    let _ = writeln!(out, "Up next today");
    render_section(&mut out, &view.buckets.upcoming, view.timezone, "nothing else today");

    out
}

fn render_section(out: &mut String, events: &[ClassifiedEvent], timezone: Tz, empty: &str) {
    if events.is_empty() {
        let _ = writeln!(out, "  {empty}");
        return;
    }

    for classified in events {
        let tag = format!("[{}]", classified.urgency.as_str());
        let span = format!(
            "{}-{}",
            classified.starts_at.with_timezone(&timezone).format("%H:%M"),
            classified.ends_at.with_timezone(&timezone).format("%H:%M")
        );
        let detail = if classified.happening_now() {
            format!(
                "started {}, {} left",
                classified.relative_label,
                format_countdown(classified.seconds_remaining)
            )
        } else {
            classified.relative_label.clone()
        };
        let _ = writeln!(
            out,
            "  {tag:<11} {span}  {}  ({detail})",
            classified.event.display_title()
        );
    }
}

/// Compact countdown: "1h 05m", "4m 09s" or "42s".
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}
