//! # Data API
//!
//! The hosted database as seen by the wall: two collections and a change feed.
//!
//! Implementations:
//! - [`MemoryDatabase`](crate::MemoryDatabase): in-process, used by tests and single-node servers
//! - `server::database::RedisDatabase`: redis hashes with atomic vote increments
//! - `client::remote::RemoteDatabase`: HTTP and websocket calls to a running server
//!
//! Nothing behind this trait knows who is voting. Vote and ownership gating lives entirely
//! on the client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::BoardError,
    models::{ChangeEvent, ChangeFilter, Comment, Feedback, NewComment, NewFeedback, PostId, SortOrder},
};

#[async_trait]
pub trait Database: Send + Sync {
    async fn list_feedback(&self, order: SortOrder) -> Result<Vec<Feedback>, BoardError>;

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, BoardError>;

    /// Adds one vote and returns the updated post.
    async fn upvote(&self, id: PostId) -> Result<Feedback, BoardError>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, BoardError>;

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, BoardError>;

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, BoardError>;
}

/// Stream of change events matching one [`ChangeFilter`].
///
/// Dropping the subscription stops delivery.
pub struct Subscription {
    filter: ChangeFilter,
    receiver: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(filter: ChangeFilter, receiver: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { filter, receiver }
    }

    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// Next matching event, or `None` once the source has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            let event = self.receiver.recv().await?;

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }
}
