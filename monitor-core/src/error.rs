use thiserror::Error;

/// Why a single city's fetch produced no reading.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("weather API responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the JSON shape we expect from the current-weather endpoint.
    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("fetch task aborted: {0}")]
    Task(String),
}

/// A failed fetch, tagged with the city it was for.
#[derive(Debug, Error)]
#[error("failed to fetch weather for {city}: {error}")]
pub struct FetchFailure {
    pub city: String,
    #[source]
    pub error: FetchError,
}

impl FetchFailure {
    pub fn new(city: impl Into<String>, error: FetchError) -> Self {
        Self { city: city.into(), error }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadingError {
    #[error("timestamp {0} is outside the representable date range")]
    TimestampOutOfRange(i64),
}
