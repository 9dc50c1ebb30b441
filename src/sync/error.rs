use std::time::Duration;

use thiserror::Error;

/// Why a remote call produced no payload.
///
/// Throttling is not an error: a throttled call resolves to a fallback, or to
/// [`Fetched::Unavailable`](super::Fetched::Unavailable) when there is none.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Network error: {0}")]
  NetworkFailure(String),

  #[error("Unauthorized (status {status}) - sign in again")]
  AuthFailure { status: u16 },

  #[error("Server error {status}: {body}")]
  ServerError { status: u16, body: String },

  #[error("Request timed out after {}s", .0.as_secs_f64())]
  Timeout(Duration),

  #[error("Invalid response: {0}")]
  Decode(String),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
  /// Truncate a response body to avoid logging excessive data
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
  }

  /// Map a non-success HTTP status to an error.
  pub fn from_status(status: u16, body: &str) -> Self {
    match status {
      401 | 403 => FetchError::AuthFailure { status },
      _ => FetchError::ServerError {
        status,
        body: Self::truncate_body(body),
      },
    }
  }

  /// The user has to re-authenticate rather than retry.
  pub fn is_auth(&self) -> bool {
    matches!(self, FetchError::AuthFailure { .. })
  }
}
