//! Ingestion of government-meeting listings from OmpNetwork-hosted sites.

pub mod agency;
pub mod db;
pub mod error;
pub mod fetch;
pub mod mapper;
pub mod ompnetwork;
pub mod pagination;
pub mod rules;
pub mod runner;
pub mod schema;

pub use agency::{AgencyConfig, AgencyRegistry};
pub use error::IngestError;
pub use fetch::{EmittedMeeting, FetchResponse, Fetcher, MeetingSink, StaticFetcher};
pub use pagination::{Cursor, PageRequest, Paginator};
pub use runner::{IngestReport, ingest_agency, ingest_all};
pub use schema::{Classification, Link, Location, Meeting, MeetingStatus};
