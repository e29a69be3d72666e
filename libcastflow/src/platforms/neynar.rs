//! Neynar publishing client

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::{PublishError, Result};
use crate::platforms::CastPublisher;
use crate::types::{CastRequest, Embed};

const CAST_PATH: &str = "/v2/farcaster/cast";
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct CastBody<'a> {
    signer_uuid: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "no_embeds")]
    embeds: &'a [Embed],
}

fn no_embeds(embeds: &&[Embed]) -> bool {
    embeds.is_empty()
}

#[derive(Debug, Deserialize)]
struct CastResponse {
    cast: Option<PublishedCast>,
}

#[derive(Debug, Deserialize)]
struct PublishedCast {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map a non-success HTTP response to a PublishError
///
/// Every non-2xx status is a failed attempt; the variant only changes how
/// it reads in logs and in the post's error message.
fn map_status_error(status: StatusCode, body: &str) -> PublishError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        _ => truncate(body.trim(), MAX_ERROR_BODY),
    };
    let message = format!("HTTP {}: {}", status.as_u16(), detail);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimit(message),
        _ => PublishError::Posting(message),
    }
}

fn map_transport_error(error: reqwest::Error, timeout: Duration) -> PublishError {
    if error.is_timeout() {
        PublishError::Timeout(timeout)
    } else {
        PublishError::Network(format!("Failed to reach Neynar: {}", error))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub struct NeynarClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl NeynarClient {
    /// Create a client against `base_url` (no trailing slash required)
    pub fn new(api_key: SecretString, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Create a client from the `[neynar]` and `[publisher]` config sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = SecretString::from(config.neynar_api_key()?.expose_secret().to_string());
        Self::new(
            api_key,
            &config.neynar.base_url,
            Duration::from_secs(config.publisher.request_timeout_secs),
        )
    }
}

#[async_trait]
impl CastPublisher for NeynarClient {
    async fn publish(
        &self,
        credential: &SecretString,
        cast: &CastRequest,
    ) -> std::result::Result<String, PublishError> {
        let body = CastBody {
            signer_uuid: credential.expose_secret(),
            text: &cast.text,
            embeds: &cast.embeds,
        };

        tracing::debug!(
            "Submitting cast to Neynar ({} chars, {} embeds)",
            cast.text.chars().count(),
            cast.embeds.len()
        );

        let response = self
            .client
            .post(format!("{}{}", self.base_url, CAST_PATH))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &text));
        }

        let parsed: CastResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Posting(format!("Unreadable Neynar response: {}", e)))?;

        parsed
            .cast
            .map(|c| c.hash)
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| PublishError::Posting("Neynar response did not include a cast hash".to_string()))
    }

    fn name(&self) -> &str {
        "neynar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NeynarClient {
        NeynarClient::new(
            SecretString::from("test-api-key".to_string()),
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn signer() -> SecretString {
        SecretString::from("signer-123".to_string())
    }

    #[tokio::test]
    async fn test_publish_returns_cast_hash() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(header("x-api-key", "test-api-key"))
            .and(body_json(serde_json::json!({
                "signer_uuid": "signer-123",
                "text": "gm",
                "embeds": [{ "url": "https://img.example/1.png" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "cast": { "hash": "0xabc123", "author": { "fid": 42 }, "text": "gm" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![Embed {
                url: "https://img.example/1.png".to_string(),
            }],
        };
        let hash = client_for(&server).publish(&signer(), &cast).await.unwrap();
        assert_eq!(hash, "0xabc123");
    }

    #[tokio::test]
    async fn test_publish_omits_empty_embeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(body_json(serde_json::json!({
                "signer_uuid": "signer-123",
                "text": "no images"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cast": { "hash": "0xdef" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cast = CastRequest {
            text: "no images".to_string(),
            embeds: vec![],
        };
        assert_eq!(
            client_for(&server).publish(&signer(), &cast).await.unwrap(),
            "0xdef"
        );
    }

    #[tokio::test]
    async fn test_publish_maps_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "Invalid API key"
            })))
            .mount(&server)
            .await;

        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![],
        };
        let err = client_for(&server).publish(&signer(), &cast).await.unwrap_err();
        assert_eq!(
            err,
            PublishError::Authentication("HTTP 401: Invalid API key".to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_maps_rate_limit_and_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![],
        };

        let first = client.publish(&signer(), &cast).await.unwrap_err();
        assert_eq!(first, PublishError::RateLimit("HTTP 429: slow down".to_string()));

        let second = client.publish(&signer(), &cast).await.unwrap_err();
        assert_eq!(second, PublishError::Posting("HTTP 500: internal".to_string()));
    }

    #[tokio::test]
    async fn test_publish_without_hash_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .mount(&server)
            .await;

        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![],
        };
        let err = client_for(&server).publish(&signer(), &cast).await.unwrap_err();
        assert!(matches!(err, PublishError::Posting(_)));
    }

    #[tokio::test]
    async fn test_publish_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "cast": { "hash": "0x1" } }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = NeynarClient::new(
            SecretString::from("k".to_string()),
            &server.uri(),
            Duration::from_millis(200),
        )
        .unwrap();
        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![],
        };
        let err = client.publish(&signer(), &cast).await.unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_publish_unreachable_host_is_network_error() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let client = NeynarClient::new(
            SecretString::from("k".to_string()),
            "http://127.0.0.1:9",
            Duration::from_secs(2),
        )
        .unwrap();
        let cast = CastRequest {
            text: "gm".to_string(),
            embeds: vec![],
        };
        let err = client.publish(&signer(), &cast).await.unwrap_err();
        assert!(matches!(err, PublishError::Network(_) | PublishError::Timeout(_)));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let long = "x".repeat(2000);
        let err = map_status_error(StatusCode::BAD_REQUEST, &long);
        match err {
            PublishError::Posting(msg) => assert!(msg.len() < 600 && msg.ends_with("...")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
