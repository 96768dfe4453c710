use std::collections::HashMap;
use std::fmt;

use crate::record::{Dataset, PublicationRecord};

const KEY_SEP: &str = "||";

/// `(profile_user_id, lower(paper_title), year)`, missing parts as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn of(r: &PublicationRecord) -> Self {
        let user = r.profile_user_id.as_deref().unwrap_or("");
        let title = r.paper_title.as_deref().unwrap_or("").to_lowercase();
        let year = r.year.map(|y| y.to_string()).unwrap_or_default();
        Self([user, title.as_str(), year.as_str()].join(KEY_SEP))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ProfileName,
    Affiliation,
    ProfileUserId,
    ProfileUrl,
    PaperTitle,
    PaperUrl,
    AuthorsRaw,
    Authors,
    Journal,
    Year,
    Citations,
    ScrapedAt,
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Incoming value replaces the stored one when present.
    Overwrite,
    /// Larger of the two values.
    KeepMax,
    /// Incoming value, unconditionally.
    TakeIncoming,
}

/// Per-field conflict resolution. Fields not listed here are `Overwrite`.
pub const POLICY: &[(Field, FieldPolicy)] = &[
    (Field::Citations, FieldPolicy::KeepMax),
    (Field::ScrapedAt, FieldPolicy::TakeIncoming),
];

pub fn policy_for(field: Field) -> FieldPolicy {
    POLICY
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, p)| *p)
        .unwrap_or(FieldPolicy::Overwrite)
}

fn resolve_opt<T: Clone + Ord>(field: Field, stored: &Option<T>, incoming: &Option<T>) -> Option<T> {
    match policy_for(field) {
        FieldPolicy::Overwrite => incoming.clone().or_else(|| stored.clone()),
        FieldPolicy::KeepMax => stored.clone().max(incoming.clone()),
        FieldPolicy::TakeIncoming => incoming.clone(),
    }
}

fn resolve_text(field: Field, stored: &str, incoming: &str) -> String {
    let some = |s: &str| (!s.is_empty()).then(|| s.to_string());
    resolve_opt(field, &some(stored), &some(incoming)).unwrap_or_default()
}

fn resolve_count(field: Field, stored: u32, incoming: u32) -> u32 {
    match policy_for(field) {
        FieldPolicy::Overwrite | FieldPolicy::TakeIncoming => incoming,
        FieldPolicy::KeepMax => stored.max(incoming),
    }
}

fn resolve_list(field: Field, stored: &[String], incoming: &[String]) -> Vec<String> {
    match policy_for(field) {
        FieldPolicy::Overwrite if incoming.is_empty() => stored.to_vec(),
        FieldPolicy::KeepMax if stored.len() > incoming.len() => stored.to_vec(),
        _ => incoming.to_vec(),
    }
}

/// Merge two records sharing an identity key. Starts from `stored`; every field
/// present in `incoming` wins except where `POLICY` says otherwise.
pub fn merge_record(stored: &PublicationRecord, incoming: &PublicationRecord) -> PublicationRecord {
    let mut extra = stored.extra.clone();
    for (k, v) in &incoming.extra {
        let merged = resolve_text(Field::Extra, extra.get(k).map_or("", String::as_str), v);
        extra.insert(k.clone(), merged);
    }

    PublicationRecord {
        profile_name: resolve_opt(Field::ProfileName, &stored.profile_name, &incoming.profile_name),
        affiliation: resolve_opt(Field::Affiliation, &stored.affiliation, &incoming.affiliation),
        profile_user_id: resolve_opt(
            Field::ProfileUserId,
            &stored.profile_user_id,
            &incoming.profile_user_id,
        ),
        profile_url: resolve_text(Field::ProfileUrl, &stored.profile_url, &incoming.profile_url),
        paper_title: resolve_opt(Field::PaperTitle, &stored.paper_title, &incoming.paper_title),
        paper_url: resolve_opt(Field::PaperUrl, &stored.paper_url, &incoming.paper_url),
        authors_raw: resolve_opt(Field::AuthorsRaw, &stored.authors_raw, &incoming.authors_raw),
        authors: resolve_list(Field::Authors, &stored.authors, &incoming.authors),
        journal: resolve_opt(Field::Journal, &stored.journal, &incoming.journal),
        year: resolve_opt(Field::Year, &stored.year, &incoming.year),
        citations: resolve_count(Field::Citations, stored.citations, incoming.citations),
        scraped_at: resolve_text(Field::ScrapedAt, &stored.scraped_at, &incoming.scraped_at),
        extra,
    }
}

/// Merge `incoming` into `existing`. Pure and total: every key appears exactly
/// once in the result, earlier keys keep their position, new keys are appended.
pub fn merge(existing: &Dataset, incoming: &[PublicationRecord]) -> Dataset {
    let mut index: HashMap<IdentityKey, usize> = HashMap::with_capacity(existing.len() + incoming.len());
    let mut out: Vec<PublicationRecord> = Vec::with_capacity(existing.len() + incoming.len());

    for r in existing.iter().chain(incoming) {
        let key = IdentityKey::of(r);
        match index.get(&key) {
            Some(&i) => out[i] = merge_record(&out[i], r),
            None => {
                index.insert(key, out.len());
                out.push(r.clone());
            }
        }
    }

    Dataset::new(out)
}
