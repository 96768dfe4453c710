use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::surface::{MoreControl, RawEntry};

static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#gsc_prf_in").unwrap());
static AFFIL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_prf_il").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_a_tr").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_a_at").unwrap());
static GRAY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_a_t .gs_gray").unwrap());
static YEAR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_a_y span").unwrap());
static CITES_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gsc_a_ac").unwrap());
static MORE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#gsc_bpf_more").unwrap());

/// Everything the pipeline needs from one profile HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePage {
    pub owner_name: Option<String>,
    pub affiliation: Option<String>,
    pub entries: Vec<RawEntry>,
    pub more: MoreControl,
}

impl ProfilePage {
    /// Parse a profile document. Relative links are resolved against `address`.
    /// Missing pieces of markup become `None`; parsing never fails.
    pub fn parse(html: &str, address: &str) -> Self {
        let doc = Html::parse_document(html);
        let base = Url::parse(address).ok();

        let owner_name = doc.select(&NAME_SEL).next().map(text_of);
        let affiliation = doc.select(&AFFIL_SEL).next().map(text_of);
        let entries = doc
            .select(&ROW_SEL)
            .map(|row| parse_row(row, base.as_ref()))
            .collect();

        let more = match doc.select(&MORE_SEL).next() {
            None => MoreControl::Absent,
            Some(btn) => {
                let el = btn.value();
                if el.attr("disabled").is_some() || el.classes().any(|c| c == "gs_dis") {
                    MoreControl::Disabled
                } else {
                    MoreControl::Enabled
                }
            }
        };

        Self {
            owner_name,
            affiliation,
            entries,
            more,
        }
    }
}

fn parse_row(row: ElementRef<'_>, base: Option<&Url>) -> RawEntry {
    let title_a = row.select(&TITLE_SEL).next();
    let title = title_a.map(text_of);
    let link = title_a
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve(href, base));

    RawEntry {
        title,
        link,
        gray_lines: row.select(&GRAY_SEL).take(2).map(text_of).collect(),
        year_label: row.select(&YEAR_SEL).next().map(text_of),
        citation_label: row.select(&CITES_SEL).next().map(text_of),
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
