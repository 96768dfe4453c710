use tracing::debug;

use crate::error::Result;
use crate::record::{split_authors, Dataset, PublicationRecord, COLUMNS, RAW_AUTHORS_COLUMN};

const AUTHORS_JOIN: &str = "; ";

fn header_for(dataset: &Dataset) -> Vec<String> {
    let mut headers: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    for r in dataset.iter() {
        for k in r.extra.keys() {
            if k != RAW_AUTHORS_COLUMN && !headers.contains(k) {
                headers.push(k.clone());
            }
        }
    }
    headers
}

fn cell(r: &PublicationRecord, column: &str) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    match column {
        "profile_name" => opt(&r.profile_name),
        "affiliation" => opt(&r.affiliation),
        "profile_user_id" => opt(&r.profile_user_id),
        "profile_url" => r.profile_url.clone(),
        "paper_title" => opt(&r.paper_title),
        "paper_url" => opt(&r.paper_url),
        "authors" => r.authors.join(AUTHORS_JOIN),
        "journal" => opt(&r.journal),
        "year" => r.year.map(|y| y.to_string()).unwrap_or_default(),
        "citations" => r.citations.to_string(),
        "scraped_at" => r.scraped_at.clone(),
        other => r.extra.get(other).cloned().unwrap_or_default(),
    }
}

/// Serialize a dataset as CSV. The header is the canonical columns followed by
/// extra columns in first-seen order, never `authors_raw`. `authors` is joined
/// with `"; "`. An empty dataset serializes to an empty string.
pub fn to_csv(dataset: &Dataset) -> Result<String> {
    if dataset.is_empty() {
        return Ok(String::new());
    }

    let headers = header_for(dataset);
    let mut w = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    w.write_record(&headers)?;
    for r in dataset.iter() {
        w.write_record(headers.iter().map(|h| cell(r, h)))?;
    }

    let bytes = w.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn set_field(r: &mut PublicationRecord, column: &str, value: &str) {
    let opt = || (!value.is_empty()).then(|| value.to_string());
    match column {
        "profile_name" => r.profile_name = opt(),
        "affiliation" => r.affiliation = opt(),
        "profile_user_id" => r.profile_user_id = opt(),
        "profile_url" => r.profile_url = value.to_string(),
        "paper_title" => r.paper_title = opt(),
        "paper_url" => r.paper_url = opt(),
        "authors_raw" => r.authors_raw = opt(),
        "authors" => r.authors = split_authors(value, ';'),
        "journal" => r.journal = opt(),
        "year" => r.year = value.trim().parse().ok(),
        "citations" => r.citations = value.trim().parse().unwrap_or(0),
        "scraped_at" => r.scraped_at = value.to_string(),
        other => {
            r.extra.insert(other.to_string(), value.to_string());
        }
    }
}

/// Parse interchange text. Best effort: blank lines are skipped, short rows get
/// empty trailing fields, unparseable numbers become absent (year) or 0 (citations).
pub fn parse_csv(text: &str) -> Result<Vec<PublicationRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let mut r = PublicationRecord::default();
        for (i, h) in headers.iter().enumerate() {
            if h.is_empty() {
                continue;
            }
            set_field(&mut r, h, row.get(i).unwrap_or(""));
        }
        rows.push(r.normalized());
    }

    debug!("Parsed {} interchange rows ({} columns)", rows.len(), headers.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            PublicationRecord {
                profile_name: Some("Ada Lovelace".into()),
                affiliation: Some("Analytical Engine Society".into()),
                profile_user_id: Some("abc123".into()),
                profile_url: "https://scholar.google.com/citations?user=abc123".into(),
                paper_title: Some("Notes on the Engine".into()),
                paper_url: Some("https://scholar.google.com/citations?view_op=x".into()),
                authors_raw: Some("A. Lovelace, C. Babbage".into()),
                authors: vec!["A. Lovelace".into(), "C. Babbage".into()],
                journal: Some("Scientific Memoirs".into()),
                year: Some(1843),
                citations: 42,
                scraped_at: "2024-05-01T10:00:00.000Z".into(),
                ..Default::default()
            },
            PublicationRecord {
                profile_user_id: Some("abc123".into()),
                profile_url: "https://scholar.google.com/citations?user=abc123".into(),
                paper_title: Some("Untitled sketch".into()),
                scraped_at: "2024-05-01T10:00:01.000Z".into(),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn header_excludes_raw_authors() {
        let out = to_csv(&sample()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
        assert!(!out.contains("authors_raw"));
    }

    #[test]
    fn authors_flattened_with_semicolons() {
        let out = to_csv(&sample()).unwrap();
        assert!(out.contains("A. Lovelace; C. Babbage"));
    }

    #[test]
    fn absent_fields_are_empty_cells() {
        let out = to_csv(&sample()).unwrap();
        let second = out.lines().nth(2).unwrap();
        assert!(second.starts_with(",,abc123,"));
        assert!(second.contains(",,,0,"));
    }

    #[test]
    fn round_trip_plain_values() {
        let ds = sample();
        let back = parse_csv(&to_csv(&ds).unwrap()).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in ds.iter().zip(&back) {
            let mut expected = a.clone();
            expected.authors_raw = None;
            assert_eq!(&expected, b);
        }
    }

    #[test]
    fn round_trip_quoted_values() {
        let mut ds = sample();
        ds.records[0].paper_title = Some("Commas, \"quotes\"\nand newlines".into());
        ds.records[0].affiliation = Some("London, UK".into());
        let text = to_csv(&ds).unwrap();
        assert!(text.contains("\"London, UK\""));
        assert!(text.contains("\"\"quotes\"\""));
        let back = parse_csv(&text).unwrap();
        assert_eq!(back[0].paper_title, ds.records[0].paper_title);
        assert_eq!(back[0].affiliation.as_deref(), Some("London, UK"));
    }

    #[test]
    fn short_rows_and_blank_lines() {
        let text = "\nprofile_user_id,paper_title,year,citations,authors\nu1,Alpha,2020\n\nu1,Beta,abc,—,\"X ;; Y; \"\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, Some(2020));
        assert_eq!(rows[0].citations, 0);
        assert!(rows[0].authors.is_empty());
        assert_eq!(rows[1].year, None);
        assert_eq!(rows[1].citations, 0);
        assert_eq!(rows[1].authors, vec!["X", "Y"]);
    }

    #[test]
    fn unknown_columns_carried_through() {
        let text = "paper_title,doi\nAlpha,10.1/abc\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows[0].extra.get("doi").map(String::as_str), Some("10.1/abc"));

        let out = to_csv(&Dataset::new(rows)).unwrap();
        let header = out.lines().next().unwrap();
        assert!(header.ends_with(",scraped_at,doi"));
    }

    #[test]
    fn extra_columns_keep_first_seen_order() {
        let rows = parse_csv("paper_title,zeta,alpha\nT,z,a\n").unwrap();
        let keys: Vec<&str> = rows[0].extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let mut second = PublicationRecord {
            paper_title: Some("U".into()),
            ..Default::default()
        };
        second.extra.insert("mid".into(), "m".into());
        second.extra.insert("alpha".into(), "a2".into());
        let mut ds = Dataset::new(rows);
        ds.records.push(second);

        let out = to_csv(&ds).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().ends_with(",scraped_at,zeta,alpha,mid"));
        assert!(lines.next().unwrap().ends_with(",z,a,"));
        assert!(lines.next().unwrap().ends_with(",,a2,m"));
    }

    #[test]
    fn raw_author_column_is_normalized() {
        let text = "paper_title,authors_raw\nAlpha,\"A, B\"\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows[0].authors, vec!["A", "B"]);
    }

    #[test]
    fn empty_input() {
        assert!(parse_csv("").unwrap().is_empty());
        assert_eq!(to_csv(&Dataset::default()).unwrap(), "");
    }
}
