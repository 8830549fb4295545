//! # Board
//!
//! Shared vocabulary of the feedback wall.
//!
//! Both the data service (`server`) and the wall application (`client`) speak in these
//! types. The [`Database`] trait is the boundary to the hosted data API: the server exposes
//! one over HTTP, the client consumes one, and tests plug in [`MemoryDatabase`].
//!
//! ## Collections
//!
//! - `feedback`: posts with a message, optional author/email, and a vote count
//! - `comments`: short replies attached to a post
//!
//! Every mutation publishes a [`ChangeEvent`]. Subscribers filter by table and, for
//! comments, by parent post id.

pub mod database;
pub mod error;
pub mod feed;
pub mod memory;
pub mod models;
pub mod validation;

pub use database::{Database, Subscription};
pub use error::BoardError;
pub use feed::ChangeFeed;
pub use memory::MemoryDatabase;
pub use models::{
    ChangeEvent, ChangeFilter, ChangeKind, Comment, CommentId, Feedback, NewComment, NewFeedback,
    PostId, SortOrder, Table,
};
pub use validation::{Limits, ValidationError};
