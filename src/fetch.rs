use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, ScholarError};
use crate::parser::page::ProfilePage;
use crate::settings::Settings;
use crate::surface::{ListSurface, MoreControl, OwnerInfo, RawEntry};

/// A live profile fetched chunk by chunk. "Show more" requests the next
/// `pagesize` rows starting at the number already loaded.
pub struct HttpSurface {
    client: Client,
    address: String,
    page_size: usize,
    owner: OwnerInfo,
    entries: Vec<RawEntry>,
    more: MoreControl,
}

impl HttpSurface {
    pub async fn open(settings: &Settings, address: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.request_timeout())
            .build()?;

        let mut surface = Self {
            client,
            address: address.to_string(),
            page_size: settings.page_size.max(1),
            owner: OwnerInfo {
                address: address.to_string(),
                ..Default::default()
            },
            entries: Vec::new(),
            more: MoreControl::Absent,
        };

        let first = surface.fetch_chunk(0).await?;
        surface.owner.name = first.owner_name;
        surface.owner.affiliation = first.affiliation;
        surface.more = first.more;
        surface.entries = first.entries;
        info!(
            "Opened profile {:?}: {} rows on first page",
            surface.owner.name.as_deref().unwrap_or("?"),
            surface.entries.len()
        );
        Ok(surface)
    }

    async fn fetch_chunk(&self, cstart: usize) -> Result<ProfilePage> {
        let url = page_url(&self.address, cstart, self.page_size)?;
        let start = Instant::now();
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("{} returned {}", url, status);
            return Err(ScholarError::Delivery(format!("HTTP {} for {}", status, url)));
        }
        let html = resp.text().await?;
        debug!(
            cstart,
            bytes = html.len(),
            "Fetched chunk in {}ms",
            start.elapsed().as_millis()
        );
        Ok(ProfilePage::parse(&html, &self.address))
    }
}

#[async_trait]
impl ListSurface for HttpSurface {
    fn owner(&self) -> OwnerInfo {
        self.owner.clone()
    }

    fn more_control(&self) -> MoreControl {
        self.more
    }

    async fn activate_more(&mut self) -> Result<()> {
        let page = self.fetch_chunk(self.entries.len()).await?;
        if page.entries.is_empty() {
            self.more = MoreControl::Disabled;
            return Ok(());
        }
        self.more = page.more;
        self.entries.extend(page.entries);
        Ok(())
    }

    async fn scroll_to_end(&mut self) -> Result<()> {
        // Chunks are requested explicitly; there is no scroll-triggered loading.
        Ok(())
    }

    fn entries(&self) -> Vec<RawEntry> {
        self.entries.clone()
    }
}

/// The profile address with `cstart`/`pagesize` replaced, other parameters kept.
pub fn page_url(address: &str, cstart: usize, page_size: usize) -> Result<Url> {
    let mut url =
        Url::parse(address).map_err(|_| ScholarError::NotProfileAddress(address.to_string()))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "cstart" && k != "pagesize")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("cstart", &cstart.to_string())
        .append_pair("pagesize", &page_size.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_replaces_paging_params() {
        let u = page_url(
            "https://scholar.google.com/citations?user=abc123&hl=en&cstart=20&pagesize=20",
            100,
            100,
        )
        .unwrap();
        assert_eq!(
            u.as_str(),
            "https://scholar.google.com/citations?user=abc123&hl=en&cstart=100&pagesize=100"
        );
    }

    #[test]
    fn page_url_rejects_garbage() {
        assert!(matches!(
            page_url("not a url", 0, 100),
            Err(ScholarError::NotProfileAddress(_))
        ));
    }

    #[tokio::test]
    #[ignore = "Hits live Google Scholar"]
    async fn live_profile_expands() {
        let settings = Settings::default();
        let mut s = HttpSurface::open(
            &settings,
            "https://scholar.google.com/citations?user=JicYPdAAAAAJ&hl=en",
        )
        .await
        .unwrap();
        assert!(!s.entries().is_empty());
        if s.more_control() == MoreControl::Enabled {
            let before = s.entries().len();
            s.activate_more().await.unwrap();
            assert!(s.entries().len() >= before);
        }
    }
}
