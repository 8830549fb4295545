use std::{cmp::Reverse, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = u64;
pub type CommentId = u64;

/// A post on the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: PostId,
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Kept in storage, never published. See [`Feedback::redacted`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub votes: u32,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// The post as anyone may see it, without the poster's email.
    pub fn redacted(self) -> Self {
        Self { email: None, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the `feedback` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Insert payload for the `comments` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    New,
    /// Most upvoted first, ties broken by newest.
    Top,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::New => "new",
            SortOrder::Top => "top",
        }
    }

    pub fn sort(self, items: &mut [Feedback]) {
        match self {
            SortOrder::New => items.sort_by_key(|f| Reverse((f.created_at, f.id))),
            SortOrder::Top => items.sort_by_key(|f| Reverse((f.votes, f.created_at, f.id))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(SortOrder::New),
            "top" => Ok(SortOrder::Top),
            other => Err(format!("unknown sort order `{other}`, expected `new` or `top`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Feedback,
    Comments,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Feedback => f.write_str("feedback"),
            Table::Comments => f.write_str("comments"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// Notification that a record changed. Carries identifiers only; listeners reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: u64,
    /// Parent post of a comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
}

impl ChangeEvent {
    pub fn feedback(kind: ChangeKind, id: PostId) -> Self {
        Self {
            table: Table::Feedback,
            kind,
            id,
            post_id: None,
        }
    }

    pub fn comment(id: CommentId, post_id: PostId) -> Self {
        Self {
            table: Table::Comments,
            kind: ChangeKind::Insert,
            id,
            post_id: Some(post_id),
        }
    }
}

/// Selects which change events a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub table: Table,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

impl ChangeFilter {
    pub fn feedback() -> Self {
        Self {
            table: Table::Feedback,
            post_id: None,
        }
    }

    pub fn comments(post_id: PostId) -> Self {
        Self {
            table: Table::Comments,
            post_id: Some(post_id),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }

        match self.post_id {
            Some(post_id) => event.post_id == Some(post_id),
            None => true,
        }
    }
}
