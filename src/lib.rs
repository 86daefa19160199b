pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    auth_url_impl, fetch_events_impl, list_calendars_impl, login_impl, logout_impl, show_impl,
    status_impl, watch_impl, AppState,
};
use application::bootstrap::LOGS_DIR;
use application::error::DashboardError;
use chrono::Utc;
use cli::{Cli, Command};
use infrastructure::error::InfraError;
use infrastructure::logging::init_logging;

pub async fn run(cli: Cli) -> Result<(), DashboardError> {
    let workspace_root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir().map_err(InfraError::from)?,
    };
    let watching = matches!(cli.command, Command::Watch { .. });
    init_logging(&workspace_root.join(LOGS_DIR), !watching)?;
    let state = AppState::new(workspace_root)?;

    match cli.command {
        Command::AuthUrl => {
            let url = auth_url_impl(&state)?;
            println!("{url}");
            eprintln!("open the URL, approve access, then run `nowcal login <code>`");
        }
        Command::Login { code } => {
            let login = login_impl(&state, code).await?;
            println!("signed in as {} (token valid until {})", login.user, login.expires_at);
        }
        Command::Logout => {
            logout_impl(&state)?;
            println!("signed out");
        }
        Command::Status => {
            let status = status_impl(&state)?;
            println!("{}", serde_json::to_string_pretty(&status).map_err(InfraError::from)?);
        }
        Command::Calendars => {
            for calendar in list_calendars_impl(&state).await? {
                println!("{}\t{}", calendar.id, calendar.summary);
            }
        }
        Command::Fetch { calendar_id } => {
            let fetched = fetch_events_impl(&state, calendar_id).await?;
            println!(
                "fetched {} event(s) from {}: {} happening now, {} up next",
                fetched.fetched, fetched.calendar_id, fetched.happening_now, fetched.upcoming
            );
        }
        Command::Show => {
            print!("{}", show_impl(&state, Utc::now())?);
        }
        Command::Watch { calendar, refresh } => {
            watch_impl(&state, calendar, refresh).await?;
        }
    }
    Ok(())
}
