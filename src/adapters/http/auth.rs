use crate::adapters::forward::API_KEY_HEADER;
use crate::error::{RelayError, Result};
use axum::http::HeaderMap;

/// Check the shared secret header. No configured key means no guard.
pub fn verify_api_key(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match headers.get(API_KEY_HEADER).map(|value| value.to_str()) {
        Some(Ok(key)) if key == expected => Ok(()),
        _ => {
            tracing::warn!("Rejected request with missing or wrong {}", API_KEY_HEADER);
            Err(RelayError::Unauthorized)
        }
    }
}
