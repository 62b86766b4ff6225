use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_SETUP_CONFIG_PATH: &str = "/etc/heatmap-server/config.json";

pub const DEFAULT_GRID_SIZE: usize = 40;
pub const DEFAULT_MAX_GRID_SIZE: usize = 400;

pub(crate) fn setup_config_path() -> PathBuf {
    env_optional_string("HEATMAP_SETUP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETUP_CONFIG_PATH))
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    db_max_connections: Option<u32>,
    #[serde(default)]
    excluded_station_codes: Option<Vec<String>>,
    #[serde(default)]
    enable_scattered: Option<bool>,
    #[serde(default)]
    default_grid_size: Option<usize>,
    #[serde(default)]
    max_grid_size: Option<usize>,
}

fn load_setup_config_overrides(path: &Path) -> Option<SetupConfigOverrides> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

fn apply_setup_overrides(config: &mut HeatmapConfig, overrides: &SetupConfigOverrides) {
    if let Some(value) = overrides.db_max_connections.filter(|v| *v != 0) {
        config.db_max_connections = value;
    }
    if let Some(codes) = overrides.excluded_station_codes.as_ref() {
        config.excluded_station_codes = codes
            .iter()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
    }
    if let Some(enabled) = overrides.enable_scattered {
        config.enable_scattered = enabled;
    }
    if let Some(value) = overrides.max_grid_size.filter(|v| *v != 0) {
        config.max_grid_size = value;
    }
    if let Some(value) = overrides.default_grid_size.filter(|v| *v != 0) {
        config.default_grid_size = value;
    }
}

#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Station codes left out of every heatmap query.
    pub excluded_station_codes: Vec<String>,
    pub enable_scattered: bool,
    pub default_grid_size: usize,
    pub max_grid_size: usize,
}

impl HeatmapConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let setup_overrides = load_setup_config_overrides(&setup_config_path());

        let database_url = env_optional_string("HEATMAP_DATABASE_URL")
            .or_else(|| env_optional_string("DATABASE_URL"))
            .or_else(|| {
                setup_overrides
                    .as_ref()
                    .and_then(|ov| ov.database_url.as_deref())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(|value| value.to_string())
            })
            .context("HEATMAP_DATABASE_URL (or DATABASE_URL) must be set, or present as database_url in the setup config")?;
        let database_url = normalize_database_url(database_url);

        let mut config = Self {
            database_url,
            db_max_connections: env_u32("HEATMAP_DB_MAX_CONNECTIONS", 10).max(1),
            excluded_station_codes: env_optional_string("HEATMAP_EXCLUDED_STATIONS")
                .map(|raw| parse_station_list(&raw))
                .unwrap_or_default(),
            enable_scattered: env_bool("HEATMAP_ENABLE_SCATTERED", true),
            default_grid_size: env_usize("HEATMAP_DEFAULT_GRID_SIZE", DEFAULT_GRID_SIZE),
            max_grid_size: env_usize("HEATMAP_MAX_GRID_SIZE", DEFAULT_MAX_GRID_SIZE),
        };

        if let Some(overrides) = setup_overrides.as_ref() {
            apply_setup_overrides(&mut config, overrides);
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_grid_size == 0 {
            anyhow::bail!("HEATMAP_MAX_GRID_SIZE must be at least 1");
        }
        if self.default_grid_size == 0 || self.default_grid_size > self.max_grid_size {
            anyhow::bail!(
                "HEATMAP_DEFAULT_GRID_SIZE must be between 1 and {} (got {})",
                self.max_grid_size,
                self.default_grid_size
            );
        }
        Ok(())
    }
}

fn parse_station_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|value| value.trim().to_lowercase())
    {
        Some(value) if value == "1" || value == "true" || value == "yes" => true,
        Some(value) if value == "0" || value == "false" || value == "no" => false,
        _ => default,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg2://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    url
}
