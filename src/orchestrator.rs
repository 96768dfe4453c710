use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;
use url::Url;

use crate::db::DatasetStore;
use crate::error::{Result, ScholarError};
use crate::interchange;
use crate::paginate::{Paginator, StopReason};
use crate::reconcile;
use crate::surface::ListSurface;

static SCHOLAR_HOST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^scholar\.google\.").unwrap());

/// Host `scholar.google.*`, path under `/citations`, and a `user=` query.
pub fn is_profile_address(address: &str) -> bool {
    let Ok(url) = Url::parse(address) else {
        return false;
    };
    let host_ok = url.host_str().is_some_and(|h| SCHOLAR_HOST_RE.is_match(h));
    let path_ok = url.path().starts_with("/citations");
    let has_user = url.query().is_some_and(|q| q.contains("user="));
    host_ok && path_ok && has_user
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub scraped: usize,
    pub total: usize,
    pub activations: usize,
    pub complete: bool,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Updated database: +{} (total {})", self.scraped, self.total)?;
        if !self.complete {
            write!(f, " [list not fully expanded]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub total: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imported {} rows. Total {}.", self.imported, self.total)
    }
}

/// Composes scraping, reconciliation and the interchange codec around one store.
///
/// Every mutation is a load → merge → save cycle; the save is rejected if the
/// store moved on since the load.
pub struct ScrapeOrchestrator<S: DatasetStore> {
    store: S,
}

impl<S: DatasetStore> ScrapeOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Expand and extract `surface`, then merge the result into the store.
    /// Nothing is merged if the surface fails.
    pub async fn scan<L: ListSurface>(&self, surface: &mut L, paginator: &Paginator) -> Result<ScanReport> {
        let address = surface.owner().address;
        if !is_profile_address(&address) {
            return Err(ScholarError::NotProfileAddress(address));
        }

        let expanded = paginator.expand_and_extract(surface).await?;
        let scraped = expanded.records.len();

        let snap = self.store.load()?;
        let merged = reconcile::merge(&snap.dataset, &expanded.records);
        let total = merged.len();
        self.store.save(&merged, snap.version)?;
        info!("Scan of {} merged {} rows, {} stored", address, scraped, total);

        Ok(ScanReport {
            scraped,
            total,
            activations: expanded.activations,
            complete: expanded.stop == StopReason::Exhausted,
        })
    }

    /// Serialize the stored dataset. An empty store is an error, not an empty file.
    pub fn export(&self) -> Result<String> {
        let snap = self.store.load()?;
        if snap.dataset.is_empty() {
            return Err(ScholarError::EmptyDataset);
        }
        let text = interchange::to_csv(&snap.dataset)?;
        info!("Exported {} records", snap.dataset.len());
        Ok(text)
    }

    pub fn import(&self, text: &str) -> Result<ImportReport> {
        let rows = interchange::parse_csv(text)?;
        let imported = rows.len();

        let snap = self.store.load()?;
        let merged = reconcile::merge(&snap.dataset, &rows);
        let total = merged.len();
        self.store.save(&merged, snap.version)?;
        info!("Imported {} rows, {} stored", imported, total);

        Ok(ImportReport { imported, total })
    }
}
