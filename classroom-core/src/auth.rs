//! Component C — token verification against the upstream auth service.
//!
//! The dispatcher's `connect` handling (component L) calls [`TokenVerifier`]
//! exactly once per connection attempt, before any session exists. A failure
//! — network, non-2xx, or `valid: false` — refuses the connection outright
//! (spec §6 "Connect"); it never reaches the event-protocol layer at all, so
//! it is not one of the wire `ErrorKind`s.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ClassroomError, Result};

/// The principal established by a successful token verification (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The authenticated user's id.
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
    #[serde(rename = "userId")]
    user_id: Option<i64>,
}

/// Validates a bearer credential against an external service (component C).
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies `token`, returning the resulting principal.
    ///
    /// Returns `Ok(None)` for a well-formed "invalid" response, and `Err` for
    /// any transport or protocol failure talking to the upstream service.
    async fn verify(&self, token: &str) -> Result<Option<Principal>>;
}

/// A [`TokenVerifier`] that POSTs to an external HTTP endpoint and expects
/// `{valid: bool, userId: int, ...}` in response (spec §6 "Authentication").
pub struct HttpTokenVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenVerifier {
    /// Builds a verifier that posts bearer tokens to `endpoint`.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<Principal>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClassroomError::AuthTransport(Box::new(e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| ClassroomError::AuthTransport(Box::new(e)))?;

        if !body.valid {
            return Ok(None);
        }

        match body.user_id {
            Some(user_id) => Ok(Some(Principal { user_id })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_response_deserializes_minimal_shape() {
        let parsed: VerifyResponse =
            serde_json::from_str(r#"{"valid": true, "userId": 42}"#).unwrap();
        assert!(parsed.valid);
        assert_eq!(parsed.user_id, Some(42));
    }

    #[test]
    fn verify_response_tolerates_missing_user_id_when_invalid() {
        let parsed: VerifyResponse = serde_json::from_str(r#"{"valid": false}"#).unwrap();
        assert!(!parsed.valid);
        assert_eq!(parsed.user_id, None);
    }
}
