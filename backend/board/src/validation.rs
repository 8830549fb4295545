//! # Validation
//!
//! Input rules shared by the wall and the data service.
//!
//! The wall validates before any request leaves the browser; the service checks message
//! and comment length again on insert. Votes and ownership are never validated here.
//!
//! Lengths are counted in characters after trimming.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::models::{Feedback, NewComment, NewFeedback};

pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_COMMENT_LEN: usize = 300;
pub const PREVIEW_LEN: usize = 180;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a message.")]
    EmptyMessage,

    #[error("Keep it under {0} characters.")]
    MessageTooLong(usize),

    #[error("Please enter a comment.")]
    EmptyComment,

    #[error("Keep comments under {0} characters.")]
    CommentTooLong(usize),

    #[error("Please enter a valid email.")]
    InvalidEmail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_message_len: usize,
    pub max_comment_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_len: MAX_MESSAGE_LEN,
            max_comment_len: MAX_COMMENT_LEN,
        }
    }
}

pub fn validate_message(message: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = message.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    if trimmed.chars().count() > max_len {
        return Err(ValidationError::MessageTooLong(max_len));
    }

    Ok(trimmed.to_string())
}

pub fn validate_comment(content: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyComment);
    }

    if trimmed.chars().count() > max_len {
        return Err(ValidationError::CommentTooLong(max_len));
    }

    Ok(trimmed.to_string())
}

/// Blank names are stored as `None` and rendered as "Anonymous".
pub fn normalize_author(author: &str) -> Option<String> {
    let trimmed = author.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn normalize_email(email: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Ok(None);
    }

    if !EMAIL.is_match(trimmed) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(Some(trimmed.to_lowercase()))
}

/// Returns the normalized form of a post, or the first rule it breaks.
pub fn validate_feedback(input: &NewFeedback, limits: &Limits) -> Result<NewFeedback, ValidationError> {
    let message = validate_message(&input.message, limits.max_message_len)?;
    let email = match input.email.as_deref() {
        Some(email) => normalize_email(email)?,
        None => None,
    };

    Ok(NewFeedback {
        message,
        author: input.author.as_deref().and_then(normalize_author),
        email,
    })
}

pub fn validate_new_comment(input: &NewComment, limits: &Limits) -> Result<NewComment, ValidationError> {
    Ok(NewComment {
        post_id: input.post_id,
        content: validate_comment(&input.content, limits.max_comment_len)?,
        author: input.author.as_deref().and_then(normalize_author),
    })
}

/// Escapes text for insertion into HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// First [`PREVIEW_LEN`] characters followed by an ellipsis, and whether anything was cut.
pub fn preview(text: &str) -> (String, bool) {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((cut, _)) => (format!("{}…", &text[..cut]), true),
        None => (text.to_string(), false),
    }
}

pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_seconds().max(0);

    if diff < 60 {
        format!("{diff}s ago")
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86400 {
        format!("{}h ago", diff / 3600)
    } else {
        timestamp.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Case-insensitive match on message or author. A blank query matches everything.
pub fn matches_query(item: &Feedback, query: &str) -> bool {
    let needle = query.trim().to_lowercase();

    if needle.is_empty() {
        return true;
    }

    item.message.to_lowercase().contains(&needle)
        || item
            .author
            .as_deref()
            .is_some_and(|author| author.to_lowercase().contains(&needle))
}
