use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScholarError>;

#[derive(Debug, Error)]
pub enum ScholarError {
    /// The target is not a Scholar author page; nothing was scraped.
    #[error("Please open a Scholar author page (citations?user=...), got {0}")]
    NotProfileAddress(String),

    /// The page surface could not be reached or failed mid-expansion.
    #[error("Scrape failed: {0}")]
    Delivery(String),

    #[error("Scrape failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Nothing to download. Please Scan first.")]
    EmptyDataset,

    /// Another writer saved the dataset between our load and save.
    #[error("dataset changed while merging (expected version {expected}, found {found}); run again")]
    VersionConflict { expected: u64, found: u64 },

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("stored dataset is unreadable: {0}")]
    Blob(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
