//! # Redis
//!
//! Persistent storage for the wall.
//!
//! ## Layout
//!
//! - `feedback`: hash of post id to JSON record (vote count not authoritative here)
//! - `feedback:votes`: hash of post id to vote count, bumped with `HINCRBY`
//! - `feedback:next_id`, `comments:next_id`: id counters bumped with `INCR`
//! - `comments:{post_id}`: hash of comment id to JSON record
//!
//! Vote increments are atomic on the redis side, so concurrent upvotes never lose a count.
//! Change events are fanned out in-process; a second server instance would not see them.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use board::{
    BoardError, ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Comment, Database, Feedback,
    NewComment, NewFeedback, PostId, SortOrder, Subscription, Table,
};
use chrono::Utc;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

pub const FEEDBACK_KEY: &str = "feedback";
pub const VOTES_KEY: &str = "feedback:votes";
pub const NEXT_FEEDBACK_ID_KEY: &str = "feedback:next_id";
pub const NEXT_COMMENT_ID_KEY: &str = "comments:next_id";

pub fn comments_key(post_id: PostId) -> String {
    format!("comments:{post_id}")
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

pub struct RedisDatabase {
    connection: ConnectionManager,
    feed: ChangeFeed,
}

impl RedisDatabase {
    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        Ok(Self {
            connection: init_redis(redis_url).await?,
            feed: ChangeFeed::new(),
        })
    }

    async fn fetch_feedback(&self, id: PostId) -> Result<Feedback, BoardError> {
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn.hget(FEEDBACK_KEY, id).await.map_err(BoardError::backend)?;
        let votes: Option<u32> = conn.hget(VOTES_KEY, id).await.map_err(BoardError::backend)?;

        let mut record: Feedback = match raw {
            Some(raw) => decode(&raw)?,
            None => {
                return Err(BoardError::NotFound {
                    table: Table::Feedback,
                    id,
                });
            }
        };
        record.votes = votes.unwrap_or(0);

        Ok(record)
    }
}

fn encode<T: Serialize>(record: &T) -> Result<String, BoardError> {
    serde_json::to_string(record).map_err(BoardError::backend)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, BoardError> {
    serde_json::from_str(raw).map_err(BoardError::backend)
}

/// Skips records that fail to decode instead of failing the whole listing.
fn decode_all<T: DeserializeOwned>(records: HashMap<String, String>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|(id, raw)| {
            decode(&raw)
                .map_err(|e| warn!("Skipping unreadable record {id}: {e}"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl Database for RedisDatabase {
    async fn list_feedback(&self, order: SortOrder) -> Result<Vec<Feedback>, BoardError> {
        let mut conn = self.connection.clone();

        let records: HashMap<String, String> =
            conn.hgetall(FEEDBACK_KEY).await.map_err(BoardError::backend)?;
        let votes: HashMap<String, u32> = conn.hgetall(VOTES_KEY).await.map_err(BoardError::backend)?;

        let mut items: Vec<Feedback> = decode_all(records);
        for item in items.iter_mut() {
            item.votes = votes.get(&item.id.to_string()).copied().unwrap_or(0);
        }
        order.sort(&mut items);

        Ok(items)
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, BoardError> {
        let mut conn = self.connection.clone();

        let id: PostId = conn.incr(NEXT_FEEDBACK_ID_KEY, 1).await.map_err(BoardError::backend)?;
        let record = Feedback {
            id,
            message: new.message,
            author: new.author,
            email: new.email,
            votes: 0,
            created_at: Utc::now(),
        };

        let _: () = conn
            .hset(FEEDBACK_KEY, id, encode(&record)?)
            .await
            .map_err(BoardError::backend)?;
        let _: () = conn.hset(VOTES_KEY, id, 0).await.map_err(BoardError::backend)?;

        debug!(id, "inserted feedback");
        self.feed.publish(ChangeEvent::feedback(ChangeKind::Insert, id));

        Ok(record)
    }

    async fn upvote(&self, id: PostId) -> Result<Feedback, BoardError> {
        let mut conn = self.connection.clone();

        let exists: bool = conn.hexists(FEEDBACK_KEY, id).await.map_err(BoardError::backend)?;
        if !exists {
            return Err(BoardError::NotFound {
                table: Table::Feedback,
                id,
            });
        }

        let votes: u32 = conn.hincr(VOTES_KEY, id, 1).await.map_err(BoardError::backend)?;
        debug!(id, votes, "upvoted feedback");

        let mut record = self.fetch_feedback(id).await?;
        record.votes = votes;

        self.feed.publish(ChangeEvent::feedback(ChangeKind::Update, id));

        Ok(record)
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, BoardError> {
        let mut conn = self.connection.clone();

        let records: HashMap<String, String> = conn
            .hgetall(comments_key(post_id))
            .await
            .map_err(BoardError::backend)?;

        let mut comments: Vec<Comment> = decode_all(records);
        comments.sort_by_key(|c| (c.created_at, c.id));

        Ok(comments)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, BoardError> {
        let mut conn = self.connection.clone();

        let exists: bool = conn
            .hexists(FEEDBACK_KEY, new.post_id)
            .await
            .map_err(BoardError::backend)?;
        if !exists {
            return Err(BoardError::NotFound {
                table: Table::Feedback,
                id: new.post_id,
            });
        }

        let id: u64 = conn.incr(NEXT_COMMENT_ID_KEY, 1).await.map_err(BoardError::backend)?;
        let record = Comment {
            id,
            post_id: new.post_id,
            content: new.content,
            author: new.author,
            created_at: Utc::now(),
        };

        let _: () = conn
            .hset(comments_key(record.post_id), id, encode(&record)?)
            .await
            .map_err(BoardError::backend)?;

        debug!(id, post_id = record.post_id, "inserted comment");
        self.feed.publish(ChangeEvent::comment(id, record.post_id));

        Ok(record)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, BoardError> {
        Ok(self.feed.subscribe(filter))
    }
}
