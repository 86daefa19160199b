use crate::infrastructure::error::InfraError;
use thiserror::Error;

/// Failures that reach the user. Fetch and auth failures are shown in the
/// dashboard's single error slot; malformed events never get this far.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("calendar API unavailable after {attempts} attempt(s): {last_error}")]
    ApiUnavailable { attempts: u8, last_error: String },
    #[error("failed to fetch calendar data: {0}")]
    FetchFailure(String),
    #[error("sign-in required; run `nowcal login <authorization-code>` first")]
    SignInRequired,
    #[error("no calendar selected; pass a calendar id or run `nowcal calendars`")]
    NoCalendarSelected,
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl DashboardError {
    /// Auth problems need a new login; everything else can be retried as is.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::AuthFailure(_) | Self::SignInRequired)
    }
}
