use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_token: String,
    // Empty means offline: settings only come from the local cache
    pub base_url: String,
    pub data_dir: Option<PathBuf>,
    // Same grammar as --range: "MONTH", "WEEK" or "YYYY-MM-DD..YYYY-MM-DD"
    pub default_date_range: Option<String>,
    #[serde(default = "default_pretty")]
    pub pretty_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: String::new(),
            data_dir: None,
            default_date_range: None,
            pretty_output: default_pretty(),
        }
    }
}

fn default_pretty() -> bool {
    false
}
