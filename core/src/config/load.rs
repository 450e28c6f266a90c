use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::{AppConfig, StoreBackendKind};

/// Get the default folio data directory: ~/.folio
pub fn get_folio_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".folio"))
}

/// Parse one TOML file without applying environment overrides.
pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("invalid config {}", path.display()))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.folio/config.toml (highest)
    let folio_dir = get_folio_data_dir()?;
    let folio_config = folio_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if folio_config.exists() {
        load_from_path(&folio_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    // Log files go to the data directory when no directory is set
    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = folio_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest)
pub fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Some(v) = env_value("FOLIO_MAX_CONCURRENT") {
        cfg.executor.max_concurrent = v
            .parse()
            .with_context(|| format!("FOLIO_MAX_CONCURRENT is not a number: {v}"))?;
    }
    if let Some(v) = env_value("FOLIO_PROVIDER") {
        cfg.executor.default_provider = v;
    }
    if let Some(v) = env_value("FOLIO_STORE_PATH") {
        cfg.store.backend = StoreBackendKind::File;
        cfg.store.path = Some(PathBuf::from(v));
    }
    if let Some(v) = env_value("FOLIO_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    Ok(())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
