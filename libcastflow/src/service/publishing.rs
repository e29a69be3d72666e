//! Scheduled cast publishing
//!
//! Finds posts whose scheduled time has passed, claims each one, submits it
//! through the configured [`CastPublisher`], and writes the outcome back to
//! the store before moving on to the next post.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PublisherConfig};
use crate::error::{PublishError, Result};
use crate::platforms::neynar::NeynarClient;
use crate::platforms::CastPublisher;
use crate::store::PostStore;
use crate::types::{PostFailure, ProcessingReport, ScheduledPost, StatusUpdate, MAX_IMAGES};
use crate::Database;

#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn PostStore>,
    api: Arc<dyn CastPublisher>,
    request_timeout: Duration,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn PostStore>,
        api: Arc<dyn CastPublisher>,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            store,
            api,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Override the per-call timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Publisher backed by the configured SQLite database and Neynar
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let api = NeynarClient::from_config(config)?;
        Ok(Self::new(Arc::new(db), Arc::new(api), &config.publisher))
    }

    /// Process everything due as of the current wall-clock time
    pub async fn process_due_posts_now(&self) -> Result<ProcessingReport> {
        self.process_due_posts(chrono::Utc::now().timestamp()).await
    }

    /// Publish every post due at `now`, at most once each
    ///
    /// # Errors
    ///
    /// Returns an error only if the due-post query fails, in which case no
    /// post has been touched. Failures of individual posts are recorded on
    /// the post and listed in the report.
    pub async fn process_due_posts(&self, now: i64) -> Result<ProcessingReport> {
        let due_posts = self.store.find_due_posts(now).await?;
        let mut report = ProcessingReport::default();

        if due_posts.is_empty() {
            debug!("No posts due for publishing");
            return Ok(report);
        }

        info!("Found {} post(s) due for publishing", due_posts.len());

        // Rows that couldn't be decoded fail individually; nothing is sent
        for bad in &due_posts.undecodable {
            if !self.claim(&bad.id, &mut report).await {
                continue;
            }

            let error = PublishError::Undecodable(bad.reason.clone());
            warn!("Failed to publish post {}: {}", bad.id, error);
            report.errors.push(PostFailure {
                post_id: bad.id.clone(),
                error: error.to_string(),
            });
            report.processed_count += 1;

            let update = StatusUpdate::Failed {
                error_message: error.to_string(),
            };
            self.record(&bad.id, &update, &mut report).await;
        }

        for post in &due_posts.posts {
            if !self.claim(&post.id, &mut report).await {
                continue;
            }

            let update = match self.publish_post(post).await {
                Ok(cast_hash) => {
                    info!("Published post {} via {}: {}", post.id, self.api.name(), cast_hash);
                    StatusUpdate::Posted {
                        posted_at: chrono::Utc::now().timestamp(),
                        cast_hash,
                    }
                }
                Err(e) => {
                    warn!("Failed to publish post {}: {}", post.id, e);
                    report.errors.push(PostFailure {
                        post_id: post.id.clone(),
                        error: e.to_string(),
                    });
                    StatusUpdate::Failed {
                        error_message: e.to_string(),
                    }
                }
            };
            report.processed_count += 1;

            self.record(&post.id, &update, &mut report).await;
        }

        info!(
            "Processed {} post(s): {} error(s), {} skipped",
            report.processed_count,
            report.errors.len(),
            report.skipped
        );

        Ok(report)
    }

    /// Claim `post_id` for this invocation; `false` means leave it alone
    async fn claim(&self, post_id: &str, report: &mut ProcessingReport) -> bool {
        match self.store.claim_post(post_id).await {
            Ok(true) => true,
            Ok(false) => {
                info!("Post {} was claimed elsewhere, skipping", post_id);
                report.skipped += 1;
                false
            }
            Err(e) => {
                warn!("Failed to claim post {}: {}", post_id, e);
                report.errors.push(PostFailure {
                    post_id: post_id.to_string(),
                    error: format!("Failed to claim post: {}", e),
                });
                false
            }
        }
    }

    /// Write the terminal status
    ///
    /// The post stays in `publishing` if this write fails, so it is never
    /// picked up again automatically.
    async fn record(&self, post_id: &str, update: &StatusUpdate, report: &mut ProcessingReport) {
        if let Err(e) = self.store.update_post_status(post_id, update).await {
            error!(
                "Failed to record {} status for post {}: {}",
                update.status(),
                post_id,
                e
            );
            report.errors.push(PostFailure {
                post_id: post_id.to_string(),
                error: format!("Failed to record {} status: {}", update.status(), e),
            });
        }
    }

    async fn publish_post(&self, post: &ScheduledPost) -> std::result::Result<String, PublishError> {
        let credential = self
            .store
            .get_user_credential(post.owner_fid)
            .await
            .map_err(|e| PublishError::SignerLookup(e.to_string()))?
            .ok_or(PublishError::MissingCredential(post.owner_fid))?;

        let cast = post.to_cast_request();
        if cast.is_empty() {
            return Err(PublishError::EmptyContent);
        }
        if cast.embeds.len() > MAX_IMAGES {
            return Err(PublishError::TooManyImages {
                count: cast.embeds.len(),
                max: MAX_IMAGES,
            });
        }

        match tokio::time::timeout(self.request_timeout, self.api.publish(&credential, &cast)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.request_timeout)),
        }
    }
}
