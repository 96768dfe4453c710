use url::Url;

use crate::record::{now_timestamp, split_authors, PublicationRecord};
use crate::surface::{OwnerInfo, RawEntry};

/// Citation cell shown when Scholar has no count.
const NO_DATA_GLYPH: &str = "—";

/// One record per entry, presentation order kept. A malformed entry degrades
/// field by field and never aborts the batch.
pub fn extract(owner: &OwnerInfo, entries: &[RawEntry]) -> Vec<PublicationRecord> {
    let profile_user_id = user_id_from_address(&owner.address);

    entries
        .iter()
        .map(|e| {
            let authors_raw = e.gray_lines.first().cloned();
            let authors = authors_raw
                .as_deref()
                .map(|raw| split_authors(raw, ','))
                .unwrap_or_default();

            PublicationRecord {
                profile_name: owner.name.clone(),
                affiliation: owner.affiliation.clone(),
                profile_user_id: profile_user_id.clone(),
                profile_url: owner.address.clone(),
                paper_title: e.title.clone(),
                paper_url: e.link.clone(),
                authors_raw,
                authors,
                journal: e.gray_lines.get(1).cloned(),
                year: parse_year(e.year_label.as_deref()),
                citations: parse_citations(e.citation_label.as_deref()),
                scraped_at: now_timestamp(),
                ..Default::default()
            }
        })
        .collect()
}

/// The `user` query parameter of a profile address.
pub fn user_id_from_address(address: &str) -> Option<String> {
    let url = Url::parse(address).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "user")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub fn parse_year(label: Option<&str>) -> Option<i32> {
    label.map(str::trim).and_then(|s| s.parse::<i32>().ok())
}

pub fn parse_citations(label: Option<&str>) -> u32 {
    match label.map(str::trim) {
        None | Some("") | Some(NO_DATA_GLYPH) => 0,
        Some(s) => s.replace(',', "").parse::<u32>().unwrap_or(0),
    }
}
