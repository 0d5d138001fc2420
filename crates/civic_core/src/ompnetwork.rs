//! Raw OmpNetwork API shapes.
//!
//! OmpNetwork (<https://ompnetwork.org/>) hosts video streaming and meeting
//! management for a number of municipalities. Its `api-cache` endpoints return
//! loosely typed JSON: fields go missing, come back `null`, or switch between
//! numbers and numeric strings. Everything here reads leniently; a value of
//! the wrong type is treated as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const DEFAULT_ORIGIN: &str = "https://thedalles-oregon.ompnetwork.org";

pub fn sessions_url(
    origin: &str,
    site_id: &str,
    category_id: &str,
    start: u64,
    limit: u64,
) -> String {
    format!(
        "{}/api-cache/site/{site_id}/sessions?category[]={category_id}&start={start}&limit={limit}",
        origin.trim_end_matches('/')
    )
}

/// One session entry from `results`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub date: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_documents")]
    pub documents: Vec<RawDocument>,
}

impl RawRecord {
    /// `None` when the entry is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub doc_type: Option<String>,
}

/// A pagination counter as found on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Count {
    #[default]
    Missing,
    Value(u64),
    Invalid,
}

impl Count {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Count::Missing,
            other => as_integer(other)
                .and_then(|n| u64::try_from(n).ok())
                .map(Count::Value)
                .unwrap_or(Count::Invalid),
        }
    }

    /// Absent counters read as zero; unparseable ones as `None`.
    pub fn or_zero(self) -> Option<u64> {
        match self {
            Count::Missing => Some(0),
            Count::Value(n) => Some(n),
            Count::Invalid => None,
        }
    }
}

impl<'de> Deserialize<'de> for Count {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Count::from_value(&value))
    }
}

/// Response wrapper of the `sessions` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageEnvelope {
    #[serde(default, deserialize_with = "lenient_results")]
    pub results: Vec<Value>,
    #[serde(default)]
    pub start: Count,
    #[serde(default)]
    pub size: Count,
    #[serde(default, rename = "totalSize")]
    pub total_size: Count,
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(as_integer(&value))
}

fn lenient_documents<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RawDocument>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_results<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_sessions_url() {
        assert_eq!(
            sessions_url(DEFAULT_ORIGIN, "312", "214", 0, 100),
            "https://thedalles-oregon.ompnetwork.org/api-cache/site/312/sessions?category[]=214&start=0&limit=100"
        );
        assert_eq!(
            sessions_url("https://example.ompnetwork.org/", "1", "2", 200, 50),
            "https://example.ompnetwork.org/api-cache/site/1/sessions?category[]=2&start=200&limit=50"
        );
    }

    #[test]
    fn record_tolerates_nulls_and_wrong_types() {
        let record = RawRecord::from_value(json!({
            "title": null,
            "date": "1768239000",
            "url": 17,
            "video_url": "",
            "documents": [{"url": "a.pdf", "type": null}, "junk", {"url": null}]
        }))
        .unwrap();
        assert_eq!(record.title, None);
        assert_eq!(record.date, Some(1_768_239_000));
        assert_eq!(record.url, None);
        assert_eq!(record.video_url.as_deref(), Some(""));
        assert_eq!(record.documents.len(), 2);
        assert_eq!(record.documents[0].url.as_deref(), Some("a.pdf"));
        assert_eq!(record.documents[0].doc_type, None);
    }

    #[test]
    fn documents_not_an_array_reads_as_empty() {
        let record = RawRecord::from_value(json!({"documents": {"url": "x"}})).unwrap();
        assert!(record.documents.is_empty());
    }

    #[test]
    fn non_object_entries_are_rejected() {
        assert!(RawRecord::from_value(json!(null)).is_none());
        assert!(RawRecord::from_value(json!("session")).is_none());
        assert_eq!(RawRecord::from_value(json!({})), Some(RawRecord::default()));
    }

    #[test]
    fn timestamp_accepts_integral_floats_only() {
        let record = RawRecord::from_value(json!({"date": 1768239000.0})).unwrap();
        assert_eq!(record.date, Some(1_768_239_000));
        let record = RawRecord::from_value(json!({"date": 1768239000.5})).unwrap();
        assert_eq!(record.date, None);
        let record = RawRecord::from_value(json!({"date": "soon"})).unwrap();
        assert_eq!(record.date, None);
    }

    #[test]
    fn envelope_counts_distinguish_missing_from_invalid() {
        let envelope: PageEnvelope =
            serde_json::from_value(json!({"start": 0, "size": "3", "totalSize": "lots"})).unwrap();
        assert_eq!(envelope.start, Count::Value(0));
        assert_eq!(envelope.size, Count::Value(3));
        assert_eq!(envelope.total_size, Count::Invalid);
        assert!(envelope.results.is_empty());

        let envelope: PageEnvelope = serde_json::from_value(json!({"results": null})).unwrap();
        assert_eq!(envelope.start, Count::Missing);
        assert_eq!(envelope.total_size.or_zero(), Some(0));
    }

    #[test]
    fn negative_counts_are_invalid() {
        let envelope: PageEnvelope = serde_json::from_value(json!({"size": -5})).unwrap();
        assert_eq!(envelope.size, Count::Invalid);
        assert_eq!(envelope.size.or_zero(), None);
    }
}
