//! In-memory record store for testing
//!
//! Mirrors the semantics of the SQLite store closely enough to exercise the
//! publisher: due-post selection, conditional claims, and terminal writes.
//! Failure switches let tests simulate an unreachable store.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{CastFlowError, DbError, Result};
use crate::store::PostStore;
use crate::types::{DuePosts, Fid, PostStatus, ScheduledPost, StatusUpdate, UndecodablePost};

#[derive(Default)]
pub struct MemoryStore {
    posts: Mutex<Vec<ScheduledPost>>,
    credentials: Mutex<HashMap<Fid, String>>,
    contended: Mutex<HashSet<String>>,
    undecodable: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, PostStatus)>>,
    fail_queries: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_post(&self, post: ScheduledPost) {
        self.posts.lock().unwrap().push(post);
    }

    /// Insert a post that `find_due_posts` reports as undecodable
    pub fn insert_undecodable(&self, post: ScheduledPost, reason: &str) {
        self.undecodable
            .lock()
            .unwrap()
            .insert(post.id.clone(), reason.to_string());
        self.insert_post(post);
    }

    pub fn insert_user(&self, fid: Fid, signer_uuid: &str) {
        self.credentials
            .lock()
            .unwrap()
            .insert(fid, signer_uuid.to_string());
    }

    pub fn get(&self, post_id: &str) -> Option<ScheduledPost> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
    }

    /// Make the next claim on `post_id` lose, as if another invocation won it
    pub fn contend_claim(&self, post_id: &str) {
        self.contended.lock().unwrap().insert(post_id.to_string());
    }

    /// Make `find_due_posts` fail
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make `update_post_status` fail
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Every status write in order, including claims
    pub fn writes(&self) -> Vec<(String, PostStatus)> {
        self.writes.lock().unwrap().clone()
    }

    fn unavailable(operation: &str) -> CastFlowError {
        DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("store unavailable during {}", operation),
        ))
        .into()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_due_posts(&self, now: i64) -> Result<DuePosts> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Self::unavailable("find_due_posts"));
        }

        let mut posts: Vec<ScheduledPost> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_due(now))
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.scheduled_at);

        let corrupt = self.undecodable.lock().unwrap();
        let mut due = DuePosts::default();
        for post in posts {
            match corrupt.get(&post.id) {
                Some(reason) => due.undecodable.push(UndecodablePost {
                    id: post.id,
                    reason: reason.clone(),
                }),
                None => due.posts.push(post),
            }
        }
        Ok(due)
    }

    async fn claim_post(&self, post_id: &str) -> Result<bool> {
        let mut posts = self.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(false);
        };

        if self.contended.lock().unwrap().remove(post_id) {
            post.status = PostStatus::Publishing;
            return Ok(false);
        }

        if post.status != PostStatus::Scheduled {
            return Ok(false);
        }

        post.status = PostStatus::Publishing;
        self.writes
            .lock()
            .unwrap()
            .push((post_id.to_string(), PostStatus::Publishing));
        Ok(true)
    }

    async fn get_user_credential(&self, fid: Fid) -> Result<Option<SecretString>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(&fid)
            .filter(|signer| !signer.is_empty())
            .map(|signer| SecretString::from(signer.clone())))
    }

    async fn update_post_status(&self, post_id: &str, update: &StatusUpdate) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable("update_post_status"));
        }

        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| CastFlowError::InvalidInput(format!("Post not found: {}", post_id)))?;

        match update {
            StatusUpdate::Posted {
                posted_at,
                cast_hash,
            } => {
                post.status = PostStatus::Posted;
                post.posted_at = Some(*posted_at);
                post.cast_hash = Some(cast_hash.clone());
                post.error_message = None;
            }
            StatusUpdate::Failed { error_message } => {
                post.status = PostStatus::Failed;
                post.error_message = Some(error_message.clone());
            }
        }

        self.writes
            .lock()
            .unwrap()
            .push((post_id.to_string(), update.status()));
        Ok(())
    }
}
