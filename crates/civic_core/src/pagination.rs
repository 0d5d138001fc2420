//! Offset/limit traversal of an OmpNetwork `sessions` listing.
//!
//! The controller never performs I/O. It hands out [`PageRequest`]s and turns
//! each fetched body into meetings plus a [`Cursor`] saying whether another
//! request is needed. The total can grow between runs, so traversal always
//! follows the counters reported by the latest page.

use crate::agency::AgencyConfig;
use crate::error::{IngestError, Result};
use crate::mapper;
use crate::ompnetwork::{PageEnvelope, RawRecord};
use crate::rules;
use crate::schema::{Meeting, MeetingStatus};
use serde::Serialize;
use serde_json::Value;
use time::PrimitiveDateTime;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub url: String,
    pub start: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// `start`, `size` or `totalSize` could not be read as a non-negative integer.
    InvalidCounters,
    /// `size` was zero while `start` was still below the total.
    NoProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Next(PageRequest),
    Complete,
    Halted(HaltReason),
}

impl Cursor {
    pub fn next_request(&self) -> Option<&PageRequest> {
        match self {
            Cursor::Next(request) => Some(request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub meetings: Vec<Meeting>,
    pub skipped: usize, // `results` entries that were not objects
    pub cursor: Cursor,
}

pub struct Paginator<'a> {
    agency: &'a AgencyConfig,
    listing_url: String,
}

impl<'a> Paginator<'a> {
    pub fn new(agency: &'a AgencyConfig) -> Self {
        Self {
            listing_url: agency.listing_url(),
            agency,
        }
    }

    pub fn agency(&self) -> &AgencyConfig {
        self.agency
    }

    pub fn first_request(&self) -> PageRequest {
        self.request_at(0)
    }

    fn request_at(&self, start: u64) -> PageRequest {
        PageRequest {
            url: self.agency.page_url(start),
            start,
            limit: self.agency.page_size,
        }
    }

    /// Maps one page body. Malformed JSON fails the whole page; nothing from it is kept.
    pub fn parse_page(&self, url: &str, body: &str, now: PrimitiveDateTime) -> Result<Page> {
        let value: Value = serde_json::from_str(body).map_err(|source| IngestError::MalformedPage {
            url: url.to_string(),
            source,
        })?;
        if !value.is_object() {
            return Err(IngestError::UnexpectedPageShape {
                url: url.to_string(),
            });
        }
        let envelope: PageEnvelope =
            serde_json::from_value(value).map_err(|source| IngestError::MalformedPage {
                url: url.to_string(),
                source,
            })?;

        let cursor = self.next_cursor(&envelope);
        let mut meetings = Vec::with_capacity(envelope.results.len());
        let mut skipped = 0;
        for (index, entry) in envelope.results.into_iter().enumerate() {
            match RawRecord::from_value(entry) {
                Some(record) => meetings.push(self.map_record(&record, now)),
                None => {
                    warn!(agency = %self.agency.name, index, "skipping non-object session entry");
                    skipped += 1;
                }
            }
        }

        debug!(
            agency = %self.agency.name,
            url,
            meetings = meetings.len(),
            skipped,
            ?cursor,
            "parsed page"
        );
        Ok(Page {
            meetings,
            skipped,
            cursor,
        })
    }

    pub fn map_record(&self, record: &RawRecord, now: PrimitiveDateTime) -> Meeting {
        let mut meeting = Meeting {
            id: String::new(),
            title: mapper::title(record, &self.agency.agency),
            description: mapper::description(record),
            classification: mapper::classification(self.agency.classification),
            start: mapper::start(record),
            end: mapper::end(record),
            all_day: mapper::all_day(record),
            time_notes: mapper::time_notes(record),
            location: mapper::location(record, &self.agency.location),
            links: mapper::links(record),
            source: mapper::source(record, &self.agency.origin, &self.listing_url),
            status: MeetingStatus::Tentative,
        };
        meeting.status = rules::status(&meeting, now);
        meeting.id = rules::meeting_id(&self.agency.name, &meeting);
        meeting
    }

    pub fn next_cursor(&self, envelope: &PageEnvelope) -> Cursor {
        let (Some(start), Some(size), Some(total)) = (
            envelope.start.or_zero(),
            envelope.size.or_zero(),
            envelope.total_size.or_zero(),
        ) else {
            warn!(
                agency = %self.agency.name,
                start = ?envelope.start,
                size = ?envelope.size,
                total = ?envelope.total_size,
                "unreadable pagination counters, stopping"
            );
            return Cursor::Halted(HaltReason::InvalidCounters);
        };

        let Some(next_offset) = start.checked_add(size) else {
            return Cursor::Halted(HaltReason::InvalidCounters);
        };
        if next_offset >= total {
            return Cursor::Complete;
        }
        if size == 0 {
            warn!(agency = %self.agency.name, start, total, "empty page below total, stopping");
            return Cursor::Halted(HaltReason::NoProgress);
        }
        Cursor::Next(self.request_at(next_offset))
    }
}
