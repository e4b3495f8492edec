use crate::models::payment::{Outcome, ProcessorResponse};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Parses a processor body into an [`Outcome`].
pub fn decode(body: &[u8]) -> Result<Outcome, DecodeError> {
    let response: ProcessorResponse = serde_json::from_slice(body)?;
    Ok(Outcome {
        success: response.result,
        reason: response.message,
    })
}

/// Like [`decode`], but a body that cannot be parsed becomes a failed outcome
/// carrying the parse error. The error is handed back alongside so callers can
/// tell a malformed body from a declined payment.
pub fn decode_or_fail(body: &[u8]) -> (Outcome, Option<DecodeError>) {
    match decode(body) {
        Ok(outcome) => (outcome, None),
        Err(e) => (Outcome::failed(e.to_string()), Some(e)),
    }
}
