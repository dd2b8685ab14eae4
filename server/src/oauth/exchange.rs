use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

/// Fallback shown when the provider rejects an exchange without saying why.
const GENERIC_REJECTION: &str = "Authentication failed. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Transport-level failure: connection refused, timeout, TLS.
    #[error("network error talking to the token endpoint: {0}")]
    Network(#[source] reqwest::Error),
    /// The provider refused the code, with whatever message it gave.
    #[error("provider rejected the exchange: {message}")]
    Rejected { message: String },
    /// The provider claimed success but the response had no access token.
    #[error("provider response was missing an access token")]
    MalformedResponse,
}

/// A successful exchange. Immutable; every exchange produces a new record.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// Bearer credential for subsequent API calls.
    pub access_token: String,
    /// Full provider response body, retained for diagnostics.
    pub raw_response: Value,
    /// When the exchange completed; derives the persisted record's id.
    pub retrieved_at: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of `"{client_id}:{client_secret}"`, the appIdHash
/// Fyers requires in place of transmitting the raw secret.
pub fn compute_checksum(client_id: &str, client_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(b":");
    hasher.update(client_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Performs the one-shot authorization-code exchange against the provider's
/// token endpoint.
#[derive(Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: String,
}

impl TokenExchanger {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Never retried: codes are single-use and invalidated by the provider on
    /// first exchange, so a retry would fail anyway. A caller wanting
    /// resilience re-runs the whole login flow.
    pub async fn exchange(
        &self,
        code: &str,
        app_id_hash: &str,
    ) -> Result<TokenRecord, ExchangeError> {
        let payload = serde_json::json!({
            "grant_type": "authorization_code",
            "appIdHash": app_id_hash,
            "code": code,
        });

        let response = self
            .http
            .post(&self.token_url)
            .json(&payload)
            .send()
            .await
            .map_err(ExchangeError::Network)?;

        let status = response.status();
        info!(%status, "Token endpoint responded");

        let body: Value = match response.json().await {
            Ok(body) => body,
            // A 200 we cannot parse is a provider bug, not a rejection.
            Err(_) if status == StatusCode::OK => return Err(ExchangeError::MalformedResponse),
            Err(_) => {
                return Err(ExchangeError::Rejected {
                    message: GENERIC_REJECTION.to_string(),
                })
            }
        };

        if status != StatusCode::OK || body["s"].as_str() != Some("ok") {
            let message = body["message"]
                .as_str()
                .unwrap_or(GENERIC_REJECTION)
                .to_string();
            return Err(ExchangeError::Rejected { message });
        }

        let access_token = body["access_token"]
            .as_str()
            .map(str::to_owned)
            .ok_or(ExchangeError::MalformedResponse)?;

        Ok(TokenRecord {
            access_token,
            raw_response: body,
            retrieved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchanger_for(server: &MockServer) -> TokenExchanger {
        let http = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        TokenExchanger::new(http, format!("{}/validate-authcode", server.uri()))
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = compute_checksum("APP-100", "secret");
        let b = compute_checksum("APP-100", "secret");
        assert_eq!(a, b);
        // Hex SHA-256.
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn checksum_changes_with_either_input() {
        let base = compute_checksum("APP-100", "secret");
        assert_ne!(base, compute_checksum("APP-101", "secret"));
        assert_ne!(base, compute_checksum("APP-100", "secret2"));
    }

    #[test]
    fn checksum_matches_known_vector() {
        // SHA-256 of "a:b".
        assert_eq!(
            compute_checksum("a", "b"),
            "6783a31eabf68ccc0660f935c0826282bdd2241f3a80a9f2d10d59aea9ebb5d8"
        );
    }

    #[tokio::test]
    async fn exchange_happy_path_returns_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate-authcode"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "authorization_code",
                "code": "AUTH1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "ok",
                "access_token": "TOK1",
            })))
            .mount(&server)
            .await;

        let record = exchanger_for(&server)
            .exchange("AUTH1", "hash")
            .await
            .unwrap();

        assert_eq!(record.access_token, "TOK1");
        assert_eq!(record.raw_response["s"], "ok");
    }

    #[tokio::test]
    async fn exchange_rejected_with_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "error",
                "message": "invalid code",
            })))
            .mount(&server)
            .await;

        let err = exchanger_for(&server)
            .exchange("AUTH1", "hash")
            .await
            .unwrap_err();

        match err {
            ExchangeError::Rejected { message } => assert_eq!(message, "invalid code"),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn exchange_rejected_on_non_200_without_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "s": "error",
            })))
            .mount(&server)
            .await;

        let err = exchanger_for(&server)
            .exchange("AUTH1", "hash")
            .await
            .unwrap_err();

        match err {
            ExchangeError::Rejected { message } => assert_eq!(message, GENERIC_REJECTION),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn exchange_ok_without_token_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "s": "ok" })),
            )
            .mount(&server)
            .await;

        let err = exchanger_for(&server)
            .exchange("AUTH1", "hash")
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::MalformedResponse));
    }

    #[tokio::test]
    async fn exchange_unparseable_200_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = exchanger_for(&server)
            .exchange("AUTH1", "hash")
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::MalformedResponse));
    }

    #[tokio::test]
    async fn exchange_connection_refused_is_network() {
        let http = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        // Port 9 (discard) is not listening locally.
        let exchanger = TokenExchanger::new(http, "http://127.0.0.1:9/validate-authcode");

        let err = exchanger.exchange("AUTH1", "hash").await.unwrap_err();
        assert!(matches!(err, ExchangeError::Network(_)));
    }
}
