use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Canonical column order for export. `authors_raw` is persisted but never exported.
pub const COLUMNS: &[&str] = &[
    "profile_name",
    "affiliation",
    "profile_user_id",
    "profile_url",
    "paper_title",
    "paper_url",
    "authors",
    "journal",
    "year",
    "citations",
    "scraped_at",
];

pub const RAW_AUTHORS_COLUMN: &str = "authors_raw";

/// One scraped or imported publication entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationRecord {
    pub profile_name: Option<String>,
    pub affiliation: Option<String>,
    pub profile_user_id: Option<String>,
    pub profile_url: String,
    pub paper_title: Option<String>,
    pub paper_url: Option<String>,
    pub authors_raw: Option<String>,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub citations: u32,
    pub scraped_at: String,
    /// Columns this crate does not know about, in the order first seen.
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl PublicationRecord {
    /// Re-derive `authors` from the raw line when only the raw line survived.
    pub fn normalized(mut self) -> Self {
        if self.authors.is_empty() {
            if let Some(raw) = self.authors_raw.as_deref() {
                self.authors = split_authors(raw, ',');
            }
        }
        self
    }
}

/// Split an author line on `sep`, trimming and dropping empty fragments.
pub fn split_authors(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Records unique by identity key. Uniqueness is maintained by `reconcile::merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    pub records: Vec<PublicationRecord>,
}

impl Dataset {
    pub fn new(records: Vec<PublicationRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PublicationRecord> {
        self.records.iter()
    }
}
