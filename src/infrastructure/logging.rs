use crate::infrastructure::error::InfraError;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE: &str = "nowcal.log";
const LOG_ENV: &str = "NOWCAL_LOG";

/// Installs the global subscriber. Everything passing the env filter goes to
/// `logs/nowcal.log`; with `console` unset nothing is written to the
/// terminal, so a redrawing dashboard is never torn by log lines.
pub fn init_logging(logs_dir: &Path, console: bool) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fs::create_dir_all(logs_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(console.then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|error| InfraError::InvalidConfig(format!("failed to set up logging: {error}")))
}
