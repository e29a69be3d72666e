//! Database operations for Cast Flow

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::warn;

use crate::error::{CastFlowError, DbError, Result};
use crate::store::PostStore;
use crate::types::{
    DuePosts, Fid, PostBody, PostStatus, QueueStats, ScheduledPost, StatusUpdate, UndecodablePost,
    User,
};

const POST_COLUMNS: &str = "id, fid, content, images, scheduled_at, status, posted_at, cast_hash, error_message, created_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a post as created by the composer
    pub async fn create_post(&self, post: &ScheduledPost) -> Result<()> {
        let content = serde_json::to_string(&post.body)
            .map_err(|e| DbError::Corrupt(format!("unserializable body: {}", e)))?;
        let images = serde_json::to_string(&post.images)
            .map_err(|e| DbError::Corrupt(format!("unserializable images: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, fid, content, images, scheduled_at, status, posted_at, cast_hash, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(post.owner_fid as i64)
        .bind(content)
        .bind(images)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(post.posted_at)
        .bind(&post.cast_hash)
        .bind(&post.error_message)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let query = format!("SELECT {} FROM scheduled_posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_post).transpose()
    }

    /// List posts, optionally filtered by status, earliest scheduled first
    pub async fn list_posts(
        &self,
        status: Option<PostStatus>,
        limit: usize,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {} FROM scheduled_posts WHERE status = ? ORDER BY scheduled_at ASC LIMIT ?",
                    POST_COLUMNS
                );
                sqlx::query(&query)
                    .bind(status.as_str())
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {} FROM scheduled_posts ORDER BY scheduled_at ASC LIMIT ?",
                    POST_COLUMNS
                );
                sqlx::query(&query)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Insert or update a user and their signer
    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (fid, username, signer_uuid, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(fid) DO UPDATE SET
                username = excluded.username,
                signer_uuid = excluded.signer_uuid
            "#,
        )
        .bind(user.fid as i64)
        .bind(&user.username)
        .bind(&user.signer_uuid)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Cancel a post that has not been picked up yet
    ///
    /// Returns `false` if the post doesn't exist or is no longer `scheduled`.
    pub async fn cancel_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_posts SET status = 'cancelled' WHERE id = ? AND status = 'scheduled'",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Put a failed or cancelled post back in the queue
    ///
    /// Clears the previous error. Returns `false` if the post doesn't exist or
    /// is not in `failed`/`cancelled`.
    pub async fn reschedule_post(&self, post_id: &str, scheduled_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'scheduled', scheduled_at = ?, error_message = NULL
            WHERE id = ? AND status IN ('failed', 'cancelled')
            "#,
        )
        .bind(scheduled_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Put a post back in the queue from `publishing` as well
    ///
    /// Recovers posts stranded mid-publish by a crash or a failed status
    /// write. Their cast may already be live. Clears the error and any
    /// recorded hash. Returns `false` if the post doesn't exist or is
    /// `scheduled`/`posted`.
    pub async fn force_reschedule_post(&self, post_id: &str, scheduled_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'scheduled', scheduled_at = ?, error_message = NULL,
                cast_hash = NULL, posted_at = NULL
            WHERE id = ? AND status IN ('failed', 'cancelled', 'publishing')
            "#,
        )
        .bind(scheduled_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Count posts per status
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM scheduled_posts GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in &rows {
            let status: String = row.try_get("status").map_err(DbError::SqlxError)?;
            let count = row.try_get::<i64, _>("count").map_err(DbError::SqlxError)? as usize;
            match parse_status(&status)? {
                PostStatus::Scheduled => stats.scheduled = count,
                PostStatus::Publishing => stats.publishing = count,
                PostStatus::Posted => stats.posted = count,
                PostStatus::Failed => stats.failed = count,
                PostStatus::Cancelled => stats.cancelled = count,
            }
        }

        stats.next_due = sqlx::query_scalar(
            "SELECT MIN(scheduled_at) FROM scheduled_posts WHERE status = 'scheduled'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(stats)
    }
}

#[async_trait]
impl PostStore for Database {
    async fn find_due_posts(&self, now: i64) -> Result<DuePosts> {
        let query = format!(
            "SELECT {} FROM scheduled_posts WHERE scheduled_at <= ? AND status = 'scheduled' ORDER BY scheduled_at ASC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        // Decode row by row so one bad post doesn't hide the rest
        let mut due = DuePosts::default();
        for row in &rows {
            match row_to_post(row) {
                Ok(post) => due.posts.push(post),
                Err(e) => {
                    let id: String = row.try_get("id").map_err(DbError::SqlxError)?;
                    let reason = match e {
                        CastFlowError::Database(DbError::Corrupt(reason)) => reason,
                        other => other.to_string(),
                    };
                    warn!("Skipping undecodable post {}: {}", id, reason);
                    due.undecodable.push(UndecodablePost { id, reason });
                }
            }
        }

        Ok(due)
    }

    async fn claim_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_posts SET status = 'publishing' WHERE id = ? AND status = 'scheduled'",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_user_credential(&self, fid: Fid) -> Result<Option<SecretString>> {
        let signer: Option<Option<String>> =
            sqlx::query_scalar("SELECT signer_uuid FROM users WHERE fid = ?")
                .bind(fid as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        Ok(signer
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from))
    }

    async fn update_post_status(&self, post_id: &str, update: &StatusUpdate) -> Result<()> {
        let query = match update {
            StatusUpdate::Posted {
                posted_at,
                cast_hash,
            } => sqlx::query(
                r#"
                UPDATE scheduled_posts
                SET status = 'posted', posted_at = ?, cast_hash = ?, error_message = NULL
                WHERE id = ?
                "#,
            )
            .bind(*posted_at)
            .bind(cast_hash),
            StatusUpdate::Failed { error_message } => sqlx::query(
                "UPDATE scheduled_posts SET status = 'failed', error_message = ? WHERE id = ?",
            )
            .bind(error_message),
        };

        query
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

fn parse_status(value: &str) -> Result<PostStatus> {
    value
        .parse()
        .map_err(|_| DbError::Corrupt(format!("unknown status '{}'", value)).into())
}

fn row_to_post(r: &SqliteRow) -> Result<ScheduledPost> {
    let id: String = r.try_get("id").map_err(DbError::SqlxError)?;
    let content: String = r.try_get("content").map_err(DbError::SqlxError)?;
    let images: String = r.try_get("images").map_err(DbError::SqlxError)?;
    let status: String = r.try_get("status").map_err(DbError::SqlxError)?;

    let body: PostBody = serde_json::from_str(&content)
        .map_err(|e| DbError::Corrupt(format!("post {} has invalid content: {}", id, e)))?;
    let images: Vec<String> = serde_json::from_str(&images)
        .map_err(|e| DbError::Corrupt(format!("post {} has invalid images: {}", id, e)))?;

    Ok(ScheduledPost {
        owner_fid: r.try_get::<i64, _>("fid").map_err(DbError::SqlxError)? as Fid,
        body,
        images,
        scheduled_at: r.try_get("scheduled_at").map_err(DbError::SqlxError)?,
        status: parse_status(&status)?,
        posted_at: r.try_get("posted_at").map_err(DbError::SqlxError)?,
        cast_hash: r.try_get("cast_hash").map_err(DbError::SqlxError)?,
        error_message: r.try_get("error_message").map_err(DbError::SqlxError)?,
        created_at: r.try_get("created_at").map_err(DbError::SqlxError)?,
        id,
    })
}
