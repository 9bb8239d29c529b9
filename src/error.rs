//! Crate-wide error type.
//!
//! Fetch errors are captured per cache entry and surfaced as entry state;
//! mutation and configuration errors are returned to the caller directly.

use thiserror::Error;

/// Errors produced by the API client, the cache, and configuration loading.
#[derive(Debug, Clone, Error)]
pub enum Error {
  /// The request never completed (DNS, connect, timeout, TLS).
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with a non-success status.
  #[error("api returned {status}: {body}")]
  Http { status: u16, body: String },

  /// Malformed parameters, caught before any request is sent.
  #[error("invalid request: {0}")]
  Validation(String),

  /// The server answered 2xx but the body did not match the expected shape.
  #[error("failed to decode response: {0}")]
  Decode(String),

  /// Configuration could not be located, read, or parsed.
  #[error("configuration error: {0}")]
  Config(String),
}

impl Error {
  /// Classify a reqwest error: anything that produced a status line is an
  /// HTTP error, everything else failed at the transport level.
  pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
    match err.status() {
      Some(status) => Error::Http {
        status: status.as_u16(),
        body: err.to_string(),
      },
      None => Error::Network(err.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_status_and_body() {
    let err = Error::Http {
      status: 403,
      body: "forbidden".to_string(),
    };
    assert_eq!(err.to_string(), "api returned 403: forbidden");
  }
}
