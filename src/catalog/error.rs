use thiserror::Error;

/// Errors raised by the catalog client.
///
/// Everything here is an infrastructure-level failure from the pipeline's
/// point of view; per-record write rejections are carried as the HTTP status
/// variant and downgraded to migrate failures by the caller.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog redirected to {location}; use the canonical server URL")]
    Redirect { location: String },

    #[error("could not obtain an XSRF token from the catalog")]
    MissingXsrfToken,

    #[error("unsupported catalog version: {0}")]
    UnsupportedVersion(String),

    #[error("catalog did not report a version")]
    MissingVersion,

    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("create response did not contain the new record uuid")]
    MissingCreatedUuid,

    #[error("invalid catalog URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
