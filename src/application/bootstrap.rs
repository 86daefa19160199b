use crate::infrastructure::config::{ensure_default_configs, load_app_config, AppConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

const DATABASE_FILE: &str = "nowcal.sqlite";
pub const LOGS_DIR: &str = "logs";

#[derive(Debug)]
pub struct BootstrapResult {
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
    pub config: AppConfig,
}

/// Creates `config/`, `state/` and `logs/` under `workspace_root`, writes the
/// default `app.json` when missing and prepares the key-value database.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join(LOGS_DIR);
    let database_path = state_dir.join(DATABASE_FILE);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_app_config(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        config_dir,
        database_path,
        config,
    })
}
