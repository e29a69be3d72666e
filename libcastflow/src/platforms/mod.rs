//! Publishing API abstraction
//!
//! The publisher hands each due cast to a [`CastPublisher`], which submits it
//! on the author's behalf and returns the remote identifier (the cast hash).
//!
//! # Examples
//!
//! ```no_run
//! use libcastflow::platforms::{neynar::NeynarClient, CastPublisher};
//! use libcastflow::{CastRequest, Config};
//! use secrecy::SecretString;
//!
//! # async fn example() -> libcastflow::Result<()> {
//! let config = Config::load()?;
//! let client = NeynarClient::from_config(&config)?;
//!
//! let signer = SecretString::from("signer-uuid".to_string());
//! let cast = CastRequest {
//!     text: "gm".to_string(),
//!     embeds: vec![],
//! };
//! let hash = client.publish(&signer, &cast).await?;
//! println!("Published: {}", hash);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::PublishError;
use crate::types::CastRequest;

pub mod neynar;

// Mock publisher is available for all builds to support integration tests
pub mod mock;

#[async_trait]
pub trait CastPublisher: Send + Sync {
    /// Submit a cast signed by `credential`
    ///
    /// Returns the remote identifier of the new cast. Any non-success outcome
    /// is a [`PublishError`]; callers treat all of them as a failed attempt.
    async fn publish(
        &self,
        credential: &SecretString,
        cast: &CastRequest,
    ) -> std::result::Result<String, PublishError>;

    /// Lowercase identifier used in logs (e.g. "neynar")
    fn name(&self) -> &str;
}
