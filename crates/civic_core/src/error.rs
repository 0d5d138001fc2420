use std::error::Error as StdError;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Why one agency's ingestion stopped before reaching the reported total.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("malformed page at {url}")]
    MalformedPage {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("page at {url} is not a JSON object")]
    UnexpectedPageShape { url: String },

    #[error("fetch failed for {url}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("sink rejected meeting {meeting_id}")]
    Sink {
        meeting_id: String,
        #[source]
        source: BoxError,
    },

    #[error("worker for agency {agency} did not finish: {message}")]
    Worker { agency: String, message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;
