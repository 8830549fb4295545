//! # Remote Database
//!
//! [`Database`] over HTTP and websocket, talking to a running data service.
use async_trait::async_trait;
use board::{
    BoardError, ChangeEvent, ChangeFilter, Comment, Database, Feedback, NewComment, NewFeedback,
    PostId, SortOrder, Subscription, Table,
};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::ClientError;

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Serialize)]
struct CommentPayload<'a> {
    content: &'a str,
    author: Option<&'a str>,
}

pub struct RemoteDatabase {
    http: Client,
    base_url: String,
}

impl RemoteDatabase {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn realtime_url(&self, filter: &ChangeFilter) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };

        match filter.post_id {
            Some(post_id) => format!("{base}/realtime?table={}&post_id={post_id}", filter.table),
            None => format!("{base}/realtime?table={}", filter.table),
        }
    }
}

/// Maps a response to a record, or to the error the service reported.
async fn read<T: DeserializeOwned>(
    response: Response,
    missing: Option<(Table, u64)>,
) -> Result<T, BoardError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await.map_err(ClientError::from)?);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(%status, %body, "Request rejected");

    match (status, missing) {
        (StatusCode::NOT_FOUND, Some((table, id))) => Err(BoardError::NotFound { table, id }),
        (status, _) if status.is_client_error() => Err(BoardError::Rejected(body)),
        (status, _) => Err(BoardError::Backend(format!("{status}: {body}"))),
    }
}

#[async_trait]
impl Database for RemoteDatabase {
    async fn list_feedback(&self, order: SortOrder) -> Result<Vec<Feedback>, BoardError> {
        let response = self
            .http
            .get(self.url("/feedback"))
            .query(&[("order", order.as_str())])
            .send()
            .await
            .map_err(ClientError::from)?;

        read(response, None).await
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, BoardError> {
        let response = self
            .http
            .post(self.url("/feedback"))
            .json(&new)
            .send()
            .await
            .map_err(ClientError::from)?;

        read(response, None).await
    }

    async fn upvote(&self, id: PostId) -> Result<Feedback, BoardError> {
        let response = self
            .http
            .post(self.url(&format!("/feedback/{id}/upvote")))
            .send()
            .await
            .map_err(ClientError::from)?;

        read(response, Some((Table::Feedback, id))).await
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, BoardError> {
        let response = self
            .http
            .get(self.url(&format!("/feedback/{post_id}/comments")))
            .send()
            .await
            .map_err(ClientError::from)?;

        read(response, Some((Table::Feedback, post_id))).await
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, BoardError> {
        let response = self
            .http
            .post(self.url(&format!("/feedback/{}/comments", new.post_id)))
            .json(&CommentPayload {
                content: &new.content,
                author: new.author.as_deref(),
            })
            .send()
            .await
            .map_err(ClientError::from)?;

        read(response, Some((Table::Feedback, new.post_id))).await
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, BoardError> {
        let url = self.realtime_url(&filter);
        let (mut stream, _) = connect_async(url.as_str()).await.map_err(ClientError::from)?;
        debug!(%url, "Realtime connected");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ChangeEvent>(text.as_str()) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring unreadable change event: {e}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Realtime connection lost: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(filter, rx))
    }
}
