pub mod config;
pub mod export;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};

use rcpt_core::{RcptConfig, ReceiptStore};
use tracing::debug;

/// `--config` if given, else the per-user config file.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rcpt")
            .join("config.json")
    })
}

/// Configuration from the config file when it exists, then the environment.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    let path = config_file(config_path);
    if config_path.is_some() && !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let file = path.exists().then_some(path.as_path());
    debug!("Loading configuration from {:?}", file);
    Ok(RcptConfig::load(file)?)
}

/// Open the receipt database, creating its directory if needed.
pub fn open_store(path: &Path) -> anyhow::Result<ReceiptStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(ReceiptStore::open(path)?)
}
