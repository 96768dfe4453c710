use async_trait::async_trait;

use crate::error::Result;
use crate::parser::page::ProfilePage;

/// State of the "show more" affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreControl {
    Absent,
    Disabled,
    Enabled,
}

/// Owner-level metadata shared by every entry on the surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerInfo {
    pub name: Option<String>,
    pub affiliation: Option<String>,
    /// Address the surface was loaded from.
    pub address: String,
}

/// One entry element as exposed by the surface, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Grey lines under the title: authors first, venue second.
    pub gray_lines: Vec<String>,
    pub year_label: Option<String>,
    pub citation_label: Option<String>,
}

/// A publication list that may need "show more" activations to load fully.
/// Implementations are unreliable external sources (live HTTP, a saved page).
#[async_trait]
pub trait ListSurface: Send {
    fn owner(&self) -> OwnerInfo;

    fn more_control(&self) -> MoreControl;

    async fn activate_more(&mut self) -> Result<()>;

    async fn scroll_to_end(&mut self) -> Result<()>;

    /// Entries currently loaded, in presentation order.
    fn entries(&self) -> Vec<RawEntry>;
}

/// A saved profile page. It is already fully materialized, so it never offers more.
pub struct SnapshotSurface {
    owner: OwnerInfo,
    entries: Vec<RawEntry>,
}

impl SnapshotSurface {
    pub fn from_html(html: &str, address: &str) -> Self {
        let page = ProfilePage::parse(html, address);
        Self {
            owner: OwnerInfo {
                name: page.owner_name,
                affiliation: page.affiliation,
                address: address.to_string(),
            },
            entries: page.entries,
        }
    }
}

#[async_trait]
impl ListSurface for SnapshotSurface {
    fn owner(&self) -> OwnerInfo {
        self.owner.clone()
    }

    fn more_control(&self) -> MoreControl {
        MoreControl::Absent
    }

    async fn activate_more(&mut self) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn entries(&self) -> Vec<RawEntry> {
        self.entries.clone()
    }
}
