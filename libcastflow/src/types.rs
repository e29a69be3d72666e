//! Core types for Cast Flow

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CastFlowError;

/// Separator placed between thread entries when they are joined into one cast
pub const THREAD_SEPARATOR: &str = "\n\n---\n\n";

/// Farcaster numeric user identifier
pub type Fid = u64;

/// Neynar accepts at most this many embeds per cast
pub const MAX_IMAGES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    pub id: String,
    pub owner_fid: Fid,
    pub body: PostBody,
    pub images: Vec<String>,
    pub scheduled_at: i64,
    pub status: PostStatus,
    pub posted_at: Option<i64>,
    pub cast_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
}

impl ScheduledPost {
    pub fn new(owner_fid: Fid, body: PostBody, scheduled_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_fid,
            body,
            images: Vec::new(),
            scheduled_at,
            status: PostStatus::Scheduled,
            posted_at: None,
            cast_hash: None,
            error_message: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Whether the publisher should pick this post up at `now`
    pub fn is_due(&self, now: i64) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_at <= now
    }

    /// Build the payload sent to the publishing API
    pub fn to_cast_request(&self) -> CastRequest {
        CastRequest {
            text: self.body.joined_text(),
            embeds: self
                .images
                .iter()
                .filter(|url| !url.trim().is_empty())
                .map(|url| Embed { url: url.clone() })
                .collect(),
        }
    }
}

/// Cast text: a single block or a multi-part thread
///
/// Serialized as a bare JSON string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PostBody {
    Single(String),
    Thread(Vec<String>),
}

impl PostBody {
    /// Thread entries joined in order with [`THREAD_SEPARATOR`]
    pub fn joined_text(&self) -> String {
        match self {
            PostBody::Single(text) => text.clone(),
            PostBody::Thread(parts) => parts.join(THREAD_SEPARATOR),
        }
    }
}

impl From<&str> for PostBody {
    fn from(text: &str) -> Self {
        PostBody::Single(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Scheduled,
    /// Claimed by a running publisher invocation
    Publishing,
    Posted,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CastFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "posted" => Ok(PostStatus::Posted),
            "failed" => Ok(PostStatus::Failed),
            "cancelled" => Ok(PostStatus::Cancelled),
            _ => Err(CastFlowError::InvalidInput(format!(
                "Unknown post status '{}'. Valid options: scheduled, publishing, posted, failed, cancelled",
                s
            ))),
        }
    }
}

/// A due row whose stored content could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodablePost {
    pub id: String,
    pub reason: String,
}

/// Result of the due-post query
///
/// Rows that fail to decode are returned separately so the publisher can
/// fail them one by one instead of abandoning the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuePosts {
    pub posts: Vec<ScheduledPost>,
    pub undecodable: Vec<UndecodablePost>,
}

impl DuePosts {
    pub fn len(&self) -> usize {
        self.posts.len() + self.undecodable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Terminal state written back after a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Posted { posted_at: i64, cast_hash: String },
    Failed { error_message: String },
}

impl StatusUpdate {
    pub fn status(&self) -> PostStatus {
        match self {
            StatusUpdate::Posted { .. } => PostStatus::Posted,
            StatusUpdate::Failed { .. } => PostStatus::Failed,
        }
    }
}

/// A Farcaster account known to Cast Flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub fid: Fid,
    pub username: Option<String>,
    /// Neynar signer authorizing casts on the user's behalf
    pub signer_uuid: Option<String>,
}

/// Payload submitted to the publishing API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CastRequest {
    pub text: String,
    pub embeds: Vec<Embed>,
}

impl CastRequest {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.embeds.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Embed {
    pub url: String,
}

/// Per-post failure reported back to the trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostFailure {
    pub post_id: String,
    pub error: String,
}

/// Outcome of one `process_due_posts` invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    /// Claimed posts that reached a publish decision
    pub processed_count: usize,
    /// Due posts another invocation claimed first
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PostFailure>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Counts of posts per status, as shown by `cast-queue stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub scheduled: usize,
    pub publishing: usize,
    pub posted: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Earliest `scheduled_at` among posts still scheduled
    pub next_due: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_body_is_unchanged() {
        let body = PostBody::from("gm farcaster");
        assert_eq!(body.joined_text(), "gm farcaster");
    }

    #[test]
    fn test_thread_body_joins_with_separator() {
        let body = PostBody::Thread(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(body.joined_text(), "first\n\n---\n\nsecond");
    }

    #[test]
    fn test_thread_body_preserves_order() {
        let body = PostBody::Thread(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(body.joined_text(), "a\n\n---\n\nb\n\n---\n\nc");
    }

    #[test]
    fn test_body_deserializes_from_string_or_array() {
        let single: PostBody = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(single, PostBody::Single("hello".to_string()));

        let thread: PostBody = serde_json::from_str(r#"["one","two"]"#).unwrap();
        assert_eq!(
            thread,
            PostBody::Thread(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn test_cast_request_includes_images_as_embeds() {
        let post = ScheduledPost::new(42, PostBody::from("look"), 0).with_images(vec![
            "https://img.example/1.png".to_string(),
            "".to_string(),
            "https://img.example/2.png".to_string(),
        ]);

        let request = post.to_cast_request();
        assert_eq!(request.text, "look");
        assert_eq!(
            request.embeds,
            vec![
                Embed { url: "https://img.example/1.png".to_string() },
                Embed { url: "https://img.example/2.png".to_string() },
            ]
        );
    }

    #[test]
    fn test_cast_request_empty() {
        let post = ScheduledPost::new(1, PostBody::from("   "), 0);
        assert!(post.to_cast_request().is_empty());

        let with_image = post.with_images(vec!["https://img.example/x.png".to_string()]);
        assert!(!with_image.to_cast_request().is_empty());
    }

    #[test]
    fn test_is_due() {
        let mut post = ScheduledPost::new(1, PostBody::from("x"), 100);
        assert!(post.is_due(100));
        assert!(post.is_due(101));
        assert!(!post.is_due(99));

        post.status = PostStatus::Posted;
        assert!(!post.is_due(200));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            PostStatus::Scheduled,
            PostStatus::Publishing,
            PostStatus::Posted,
            PostStatus::Failed,
            PostStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert!("pending".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_report_serialization_omits_empty_fields() {
        let report = ProcessingReport {
            processed_count: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({ "processedCount": 2 }));

        let report = ProcessingReport {
            processed_count: 1,
            skipped: 1,
            errors: vec![PostFailure {
                post_id: "p1".to_string(),
                error: "boom".to_string(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "processedCount": 1,
                "skipped": 1,
                "errors": [{ "postId": "p1", "error": "boom" }]
            })
        );
    }
}
