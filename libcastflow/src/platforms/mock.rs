//! Mock publisher for testing
//!
//! Records every cast it receives and can be configured to fail (always, or
//! only for specific text) or to respond slowly. Used by the publisher tests
//! and the binaries' integration tests instead of a live Neynar account.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;
use crate::platforms::CastPublisher;
use crate::types::CastRequest;

/// A cast captured by the mock, with the signer it was submitted under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCast {
    pub signer_uuid: String,
    pub request: CastRequest,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Whether publishing should succeed
    pub publish_succeeds: bool,

    /// Error to return when publishing fails
    pub publish_error: Option<PublishError>,

    /// Casts whose text equals one of these fail even when `publish_succeeds`
    pub failing_texts: Vec<String>,

    /// Delay before completing (simulates network latency)
    pub delay: Duration,

    /// Number of times publish has been called
    pub call_count: Arc<Mutex<usize>>,

    /// Casts that have been submitted, successful or not
    pub published: Arc<Mutex<Vec<RecordedCast>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            publish_succeeds: true,
            publish_error: None,
            failing_texts: Vec::new(),
            delay: Duration::from_millis(0),
            call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A publisher that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A publisher that always fails with `error`
    pub fn failure(error: PublishError) -> Self {
        Self::new(MockConfig {
            publish_succeeds: false,
            publish_error: Some(error),
            ..Default::default()
        })
    }

    /// A publisher that fails only for casts with the given text
    pub fn failing_for(texts: &[&str]) -> Self {
        Self::new(MockConfig {
            failing_texts: texts.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        })
    }

    /// A publisher that waits `delay` before succeeding
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    pub fn call_count(&self) -> usize {
        *self.config.call_count.lock().unwrap()
    }

    pub fn published(&self) -> Vec<RecordedCast> {
        self.config.published.lock().unwrap().clone()
    }

    pub fn published_texts(&self) -> Vec<String> {
        self.published().into_iter().map(|c| c.request.text).collect()
    }
}

#[async_trait]
impl CastPublisher for MockPublisher {
    async fn publish(
        &self,
        credential: &SecretString,
        cast: &CastRequest,
    ) -> std::result::Result<String, PublishError> {
        let call_number = {
            let mut count = self.config.call_count.lock().unwrap();
            *count += 1;
            *count
        };

        self.config.published.lock().unwrap().push(RecordedCast {
            signer_uuid: credential.expose_secret().to_string(),
            request: cast.clone(),
        });

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        let fails_for_text = self.config.failing_texts.iter().any(|t| *t == cast.text);

        if self.config.publish_succeeds && !fails_for_text {
            Ok(format!("0x{:040x}", call_number))
        } else {
            Err(self
                .config
                .publish_error
                .clone()
                .unwrap_or_else(|| PublishError::Posting("Mock publishing failed".to_string())))
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
