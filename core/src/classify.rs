//! Maps response statuses and transport failures onto `ApiError`.
//!
//! The status table is evaluated in order; anything it does not recognise
//! becomes `ApiError::Transmission` with a warning rather than a hard failure,
//! so new status codes never break callers.

use tracing::warn;

use crate::error::{ApiError, ErrorDetails};
use crate::http::{Headers, TransportError};

/// Classify a received response. `Ok(())` means the body should be decoded.
pub fn classify_status(status: u16, headers: &Headers, body: &[u8]) -> Result<(), ApiError> {
    let details = |message: String| ErrorDetails::from_response(status, headers, body, message);
    match status {
        200..=299 => Ok(()),
        301 | 302 | 303 | 307 => {
            let message = match headers.get("location") {
                Some(location) => format!("redirect to {location}"),
                None => format!("unresolved redirect (status {status})"),
            };
            Err(ApiError::Redirect(details(message)))
        }
        401 => Err(ApiError::Authorization(details("unauthorized".to_string()))),
        429 => Err(ApiError::RateLimit(details("rate limit exceeded".to_string()))),
        304 | 400 | 402..=499 => Err(ApiError::Client(details(format!(
            "invalid request (status {status})"
        )))),
        500..=599 => Err(ApiError::Server(details(format!(
            "server error (status {status})"
        )))),
        _ => {
            warn!(status, "unrecognised HTTP status code");
            Err(ApiError::Transmission(details(format!(
                "invalid response status {status}"
            ))))
        }
    }
}

/// Classify a failure raised by the transport itself.
pub fn classify_transport_error(error: TransportError) -> ApiError {
    match error {
        TransportError::MalformedResponse {
            response: Some(response),
            ..
        } => match classify_status(response.status, &response.headers, &response.body) {
            Err(err) => err,
            // The transport rejected the response even though the status line
            // reads as success, so nothing usable can be decoded from it.
            Ok(()) => ApiError::Transmission(ErrorDetails::from_response(
                response.status,
                &response.headers,
                &response.body,
                "malformed response",
            )),
        },
        other => ApiError::Transmission(ErrorDetails::new(other.to_string())),
    }
}
