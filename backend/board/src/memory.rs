use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    database::{Database, Subscription},
    error::BoardError,
    feed::ChangeFeed,
    models::{
        ChangeEvent, ChangeFilter, ChangeKind, Comment, CommentId, Feedback, NewComment,
        NewFeedback, PostId, SortOrder, Table,
    },
};

#[derive(Default)]
struct Tables {
    feedback: BTreeMap<PostId, Feedback>,
    comments: BTreeMap<CommentId, Comment>,
    last_feedback_id: PostId,
    last_comment_id: CommentId,
}

/// Both collections held in process memory. Ids start at 1.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
    feed: ChangeFeed,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_feedback(&self, order: SortOrder) -> Result<Vec<Feedback>, BoardError> {
        let mut items: Vec<Feedback> = self.tables.read().await.feedback.values().cloned().collect();
        order.sort(&mut items);

        Ok(items)
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, BoardError> {
        let record = {
            let mut tables = self.tables.write().await;
            tables.last_feedback_id += 1;

            let record = Feedback {
                id: tables.last_feedback_id,
                message: new.message,
                author: new.author,
                email: new.email,
                votes: 0,
                created_at: Utc::now(),
            };
            tables.feedback.insert(record.id, record.clone());
            record
        };

        debug!(id = record.id, "inserted feedback");
        self.feed.publish(ChangeEvent::feedback(ChangeKind::Insert, record.id));

        Ok(record)
    }

    async fn upvote(&self, id: PostId) -> Result<Feedback, BoardError> {
        let record = {
            let mut tables = self.tables.write().await;
            let record = tables.feedback.get_mut(&id).ok_or(BoardError::NotFound {
                table: Table::Feedback,
                id,
            })?;
            record.votes = record.votes.saturating_add(1);
            record.clone()
        };

        self.feed.publish(ChangeEvent::feedback(ChangeKind::Update, id));

        Ok(record)
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, BoardError> {
        let tables = self.tables.read().await;

        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, BoardError> {
        let record = {
            let mut tables = self.tables.write().await;

            if !tables.feedback.contains_key(&new.post_id) {
                return Err(BoardError::NotFound {
                    table: Table::Feedback,
                    id: new.post_id,
                });
            }

            tables.last_comment_id += 1;
            let record = Comment {
                id: tables.last_comment_id,
                post_id: new.post_id,
                content: new.content,
                author: new.author,
                created_at: Utc::now(),
            };
            tables.comments.insert(record.id, record.clone());
            record
        };

        debug!(id = record.id, post_id = record.post_id, "inserted comment");
        self.feed.publish(ChangeEvent::comment(record.id, record.post_id));

        Ok(record)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, BoardError> {
        Ok(self.feed.subscribe(filter))
    }
}
