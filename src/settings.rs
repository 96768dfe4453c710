use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::paginate::{PaginationConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_SETTLE_MS};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Settings from `scholar.toml` (optional) overlaid with `SCHOLAR_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub max_iterations: usize,
    pub settle_ms: u64,
    pub page_size: usize,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/scholar.sqlite"),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            settle_ms: DEFAULT_SETTLE_MS,
            page_size: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("scholar").required(false))
            .add_source(Environment::with_prefix("SCHOLAR").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn pagination(&self) -> PaginationConfig {
        PaginationConfig {
            max_iterations: self.max_iterations,
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
