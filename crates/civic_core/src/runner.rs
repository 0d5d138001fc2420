use crate::agency::AgencyConfig;
use crate::error::{IngestError, Result};
use crate::fetch::{EmittedMeeting, Fetcher, MeetingSink};
use crate::pagination::{Cursor, HaltReason, Paginator};
use serde::Serialize;
use std::sync::Arc;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub agency: String,
    pub pages: usize,
    pub meetings: usize,
    pub skipped: usize,
    pub halted: Option<HaltReason>, // `None` once the cursor reached the total
}

impl IngestReport {
    fn new(agency: &str) -> Self {
        Self {
            agency: agency.to_string(),
            pages: 0,
            meetings: 0,
            skipped: 0,
            halted: None,
        }
    }

    pub fn completed(&self) -> bool {
        self.halted.is_none()
    }
}

/// Current UTC wall-clock time, matching how `start` is interpreted.
pub fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Walks one agency's listing to the end, emitting meetings page by page.
///
/// Meetings already handed to `sink` stay valid when a later page fails.
#[instrument(level = "info", skip_all, fields(agency = %agency.name))]
pub async fn ingest_agency<F, S>(
    fetcher: &F,
    agency: &AgencyConfig,
    sink: &mut S,
    now: PrimitiveDateTime,
) -> Result<IngestReport>
where
    F: Fetcher + ?Sized,
    S: MeetingSink + ?Sized,
{
    let paginator = Paginator::new(agency);
    let mut report = IngestReport::new(&agency.name);
    let mut request = paginator.first_request();

    loop {
        let response = fetcher
            .fetch(&request.url)
            .await
            .map_err(|source| IngestError::Fetch {
                url: request.url.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(IngestError::HttpStatus {
                url: request.url.clone(),
                status: response.status,
            });
        }

        let page = paginator.parse_page(&request.url, &response.text, now)?;
        report.pages += 1;
        report.skipped += page.skipped;

        for meeting in page.meetings {
            let meeting_id = meeting.id.clone();
            sink.emit(&agency.name, meeting)
                .map_err(|source| IngestError::Sink { meeting_id, source })?;
            report.meetings += 1;
        }

        match page.cursor {
            Cursor::Next(next) if next.start > request.start => request = next,
            Cursor::Next(next) => {
                warn!(
                    current = request.start,
                    next = next.start,
                    "next offset does not advance, stopping"
                );
                report.halted = Some(HaltReason::NoProgress);
                break;
            }
            Cursor::Complete => break,
            Cursor::Halted(reason) => {
                report.halted = Some(reason);
                break;
            }
        }
    }

    info!(
        pages = report.pages,
        meetings = report.meetings,
        skipped = report.skipped,
        halted = ?report.halted,
        "agency ingestion finished"
    );
    Ok(report)
}

/// One task per agency; results come back in input order.
///
/// A failing agency never stops the others.
pub async fn ingest_all<F>(
    fetcher: Arc<F>,
    agencies: Vec<AgencyConfig>,
    now: PrimitiveDateTime,
    tx: mpsc::UnboundedSender<EmittedMeeting>,
) -> Vec<(String, Result<IngestReport>)>
where
    F: Fetcher + 'static,
{
    let handles: Vec<_> = agencies
        .into_iter()
        .map(|agency| {
            let fetcher = Arc::clone(&fetcher);
            let mut tx = tx.clone();
            let name = agency.name.clone();
            let handle = tokio::spawn(async move {
                ingest_agency(fetcher.as_ref(), &agency, &mut tx, now).await
            });
            (name, handle)
        })
        .collect();
    drop(tx);

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(IngestError::Worker {
                agency: name.clone(),
                message: err.to_string(),
            }),
        };
        if let Err(err) = &result {
            warn!(agency = %name, error = %err, "agency ingestion failed");
        }
        results.push((name, result));
    }
    results
}
