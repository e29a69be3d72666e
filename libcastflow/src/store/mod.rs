//! Record store abstraction
//!
//! The publisher only needs four operations from the store. [`crate::Database`]
//! implements them over SQLite; [`memory::MemoryStore`] is an in-process
//! implementation for tests.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Result;
use crate::types::{DuePosts, Fid, StatusUpdate};

// Available for all builds so integration tests in other crates can use it
pub mod memory;

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts with status `scheduled` and `scheduled_at <= now`, earliest first
    ///
    /// Ties on `scheduled_at` come back in the store's default order. A row
    /// that cannot be decoded is listed in `undecodable` rather than
    /// failing the query.
    async fn find_due_posts(&self, now: i64) -> Result<DuePosts>;

    /// Atomically move a post from `scheduled` to `publishing`
    ///
    /// Returns `false` if the post is no longer `scheduled`, meaning another
    /// invocation (or an external cancellation) got there first.
    async fn claim_post(&self, post_id: &str) -> Result<bool>;

    /// The posting credential (Neynar signer) for a user, if any
    async fn get_user_credential(&self, fid: Fid) -> Result<Option<SecretString>>;

    /// Record the terminal outcome of a publish attempt
    async fn update_post_status(&self, post_id: &str, update: &StatusUpdate) -> Result<()>;
}
