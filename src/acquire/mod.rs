//! Best-effort acquisition collaborators: the county session identifier and
//! per-property photos.
//!
//! Both talk to third-party sites whose markup and session protocols drift.
//! Failures are never fatal: every public entry point degrades to `None` so
//! the caller can fall back to manual input or skip enrichment. These are
//! the only components that perform blocking network I/O, and they are
//! never invoked from inside the comparison path.

use std::time::Duration;

use thiserror::Error;

pub mod photo;
pub mod session;

/// Timeout applied to every outbound request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser-like user agent; both sites reject the default client string.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed; check credentials")]
    AuthenticationFailed,

    #[error("unexpected page structure: {0}")]
    MarkupDrift(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared blocking client: cookie jar (the county portal is session-based),
/// request timeout, browser user agent.
pub(crate) fn http_client() -> Result<reqwest::blocking::Client, AcquisitionError> {
    Ok(reqwest::blocking::Client::builder()
        .cookie_store(true)
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}
