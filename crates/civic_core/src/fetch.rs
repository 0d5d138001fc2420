use crate::error::BoxError;
use crate::schema::Meeting;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub text: String,
}

impl FetchResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam. Retries, timeouts and rate limits belong to implementors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, BoxError>;
}

/// Serves canned bodies keyed by URL; anything else is a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, BoxError> {
        Ok(match self.pages.get(url) {
            Some(body) => FetchResponse::ok(body.clone()),
            None => FetchResponse {
                status: 404,
                text: String::new(),
            },
        })
    }
}

/// Receives meetings one at a time as pages are mapped.
pub trait MeetingSink {
    fn emit(&mut self, agency: &str, meeting: Meeting) -> Result<(), BoxError>;
}

impl MeetingSink for Vec<Meeting> {
    fn emit(&mut self, _agency: &str, meeting: Meeting) -> Result<(), BoxError> {
        self.push(meeting);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EmittedMeeting {
    pub agency: String,
    pub meeting: Meeting,
}

impl MeetingSink for mpsc::UnboundedSender<EmittedMeeting> {
    fn emit(&mut self, agency: &str, meeting: Meeting) -> Result<(), BoxError> {
        self.send(EmittedMeeting {
            agency: agency.to_string(),
            meeting,
        })?;
        Ok(())
    }
}
