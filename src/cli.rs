use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace holding config/, state/ and logs/ (defaults to the current directory)
    #[arg(long, value_name = "DIR", env = "NOWCAL_ROOT", global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the Google sign-in URL
    AuthUrl,
    /// Exchange an authorization code and store the token
    Login {
        /// Code shown by Google after approving access
        code: String,
    },
    /// Forget the stored token
    Logout,
    /// Show sign-in state and cached snapshot size
    Status,
    /// List calendars, waiting for the API to become reachable
    Calendars,
    /// Fetch upcoming events once and store them as the snapshot
    Fetch {
        /// Calendar to read; remembered as the default
        calendar_id: Option<String>,
    },
    /// Render the cached snapshot once
    Show,
    /// Live dashboard that redraws every tick until Ctrl-C
    Watch {
        /// Calendar to read instead of the configured default
        #[arg(long, value_name = "ID")]
        calendar: Option<String>,
        /// Fetch immediately instead of starting from the snapshot only
        #[arg(long)]
        refresh: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_flags() {
        let cli = Cli::try_parse_from(["nowcal", "--root", "/tmp/ws", "watch", "--calendar", "primary", "--refresh"])
            .expect("valid arguments");

        assert_eq!(cli.root, Some(PathBuf::from("/tmp/ws")));
        match cli.command {
            Command::Watch { calendar, refresh } => {
                assert_eq!(calendar.as_deref(), Some("primary"));
                assert!(refresh);
            }
            other => panic!("expected watch, got {other:?}"),
        }
    }

    #[test]
    fn login_requires_code() {
        assert!(Cli::try_parse_from(["nowcal", "login"]).is_err());
        let cli = Cli::try_parse_from(["nowcal", "fetch"]).expect("calendar id is optional");
        assert!(matches!(cli.command, Command::Fetch { calendar_id: None }));
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
