use std::sync::Arc;

use axum::{
    Json,
    extract::{self, Path, Query, rejection::JsonRejection},
    http::StatusCode,
};
use board::{
    Comment, Feedback, NewComment, NewFeedback, PostId, SortOrder,
    validation::{validate_feedback, validate_new_comment},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError::{self, MalformedPayload},
    state::State,
};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    order: SortOrder,
}

#[derive(Deserialize)]
pub struct CommentPayload {
    content: String,
    #[serde(default)]
    author: Option<String>,
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn list_feedback_handler(
    extract::State(state): extract::State<Arc<State>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    let items = state.database.list_feedback(query.order).await?;

    Ok(Json(items.into_iter().map(Feedback::redacted).collect()))
}

pub async fn create_feedback_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Result<Json<NewFeedback>, JsonRejection>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let Json(payload) = payload.map_err(|_| MalformedPayload)?;
    let new = validate_feedback(&payload, &state.config.limits).map_err(board::BoardError::from)?;

    let record = state.database.insert_feedback(new).await?;
    info!(id = record.id, "New feedback posted");

    Ok((StatusCode::CREATED, Json(record.redacted())))
}

/// Increments unconditionally; who may vote is decided by the client.
pub async fn upvote_handler(
    extract::State(state): extract::State<Arc<State>>,
    Path(id): Path<PostId>,
) -> Result<Json<Feedback>, AppError> {
    Ok(Json(state.database.upvote(id).await?.redacted()))
}

pub async fn list_comments_handler(
    extract::State(state): extract::State<Arc<State>>,
    Path(post_id): Path<PostId>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.database.list_comments(post_id).await?))
}

pub async fn create_comment_handler(
    extract::State(state): extract::State<Arc<State>>,
    Path(post_id): Path<PostId>,
    payload: Result<Json<CommentPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let Json(payload) = payload.map_err(|_| MalformedPayload)?;
    let new = validate_new_comment(
        &NewComment {
            post_id,
            content: payload.content,
            author: payload.author,
        },
        &state.config.limits,
    )
    .map_err(board::BoardError::from)?;

    let record = state.database.insert_comment(new).await?;
    info!(id = record.id, post_id, "New comment posted");

    Ok((StatusCode::CREATED, Json(record)))
}
