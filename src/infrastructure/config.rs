use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::domain::config::AppConfig;
use crate::log;

const APP_NAME: &str = "credence";

pub fn load_config() -> AppConfig {
    let mut cfg = match confy::load(APP_NAME, "config") {
        Ok(cfg) => {
            log!("Config loaded successfully");
            cfg
        }
        Err(e) => {
            log!("Error loading config: {}. Using default.", e);
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Environment variables only fill values the config file leaves empty.
pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if cfg.api_token.trim().is_empty() {
        if let Some(token) = env_value("CREDENCE_TOKEN") {
            cfg.api_token = token;
        }
    }
    if cfg.base_url.trim().is_empty() {
        if let Some(url) = env_value("CREDENCE_BASE_URL") {
            cfg.base_url = url;
        }
    }
    if cfg.data_dir.is_none() {
        cfg.data_dir = env_value("CREDENCE_DATA_DIR").map(PathBuf::from);
    }
    cfg.base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.replace('"', "").trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Where the file store lives when the config does not say.
pub fn resolve_data_dir(cfg: &AppConfig) -> PathBuf {
    if let Some(dir) = &cfg.data_dir {
        return dir.clone();
    }
    match ProjectDirs::from("com", "Credence", APP_NAME) {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from(".credence"),
    }
}
