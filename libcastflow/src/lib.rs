//! Cast Flow - scheduled casting for Farcaster
//!
//! This library holds the scheduled-post publisher and everything it stands
//! on: the record store, the Neynar publishing client, configuration and
//! logging. The `cast-send`, `cast-api` and `cast-queue` binaries are thin
//! front ends over it.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CastFlowError, PublishError, Result};
pub use service::Publisher;
pub use store::PostStore;
pub use types::{
    CastRequest, DuePosts, Embed, Fid, PostBody, PostFailure, PostStatus, ProcessingReport,
    QueueStats, ScheduledPost, StatusUpdate, UndecodablePost, User, MAX_IMAGES, THREAD_SEPARATOR,
};
