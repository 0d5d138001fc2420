//! Per-record field derivation.
//!
//! Every function here is total: missing or malformed input falls back to a
//! default instead of failing, so one bad session never costs the rest of the
//! page.

use crate::ompnetwork::RawRecord;
use crate::schema::{Classification, Link, Location};
use time::{OffsetDateTime, PrimitiveDateTime};

pub fn title(record: &RawRecord, fallback_agency_name: &str) -> String {
    match record.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => fallback_agency_name.to_string(),
    }
}

pub fn description(_record: &RawRecord) -> String {
    String::new()
}

pub fn classification(configured: Classification) -> Classification {
    configured
}

/// Epoch seconds rendered as UTC wall-clock time, without an offset.
pub fn start(record: &RawRecord) -> Option<PrimitiveDateTime> {
    let timestamp = record.date?;
    let utc = OffsetDateTime::from_unix_timestamp(timestamp).ok()?;
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

pub fn end(_record: &RawRecord) -> Option<PrimitiveDateTime> {
    None
}

pub fn all_day(_record: &RawRecord) -> bool {
    false
}

pub fn time_notes(_record: &RawRecord) -> String {
    String::new()
}

pub fn location(_record: &RawRecord, configured: &Location) -> Location {
    configured.clone()
}

pub fn links(record: &RawRecord) -> Vec<Link> {
    let mut links = Vec::with_capacity(record.documents.len() + 1);

    if let Some(video_url) = non_blank(record.video_url.as_deref()) {
        links.push(Link {
            href: video_url.to_string(),
            title: "Video".to_string(),
        });
    }

    for doc in &record.documents {
        let Some(href) = non_blank(doc.url.as_deref()) else {
            continue;
        };
        let title = non_blank(doc.doc_type.as_deref()).unwrap_or("Document");
        links.push(Link {
            href: href.to_string(),
            title: title.to_string(),
        });
    }

    links
}

pub fn source(record: &RawRecord, origin: &str, fallback_listing_url: &str) -> String {
    match non_blank(record.url.as_deref()) {
        Some(path) => format!("{}{}", origin.trim_end_matches('/'), path),
        None => fallback_listing_url.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
