/// Error types for the rankreel core library
use thiserror::Error;

use crate::scale::ScaleUnit;

/// Failure to parse a user supplied name (scale, provider, mode)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown scale: {0}")]
    UnknownScale(String),

    #[error("unknown provider: {0} (expected sp or idp)")]
    UnknownProvider(String),

    #[error("unknown mode: {0} (expected raw or aggregate)")]
    UnknownMode(String),
}

/// Rejections raised at the period selector boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// The scale is not offered for the selected span and mode
    #[error("scale {scale} is not offered for the selected period")]
    InvalidScale { scale: ScaleUnit },

    /// `from` was committed after `to`, or the other way around
    #[error("period start {from} is after its end {to}")]
    InvertedRange { from: String, to: String },
}

/// Main error type for aggregation service calls
#[derive(Error, Debug)]
pub enum AggregationError {
    /// HTTP request failed
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("aggregation service returned status {status}")]
    Status { status: u16 },

    /// The body was not a list of records or the no_results marker
    #[error("failed to parse aggregation response: {0}")]
    ResponseParse(String),

    /// The service could not be reached at all
    #[error("aggregation service unavailable: {0}")]
    Unavailable(String),
}
