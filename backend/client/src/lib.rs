//! # Feedback Wall Client
//!
//! The wall as the visitor sees it: post, search, upvote, comment.
//!
//! ## Layers
//!
//! - [`store`]: advisory key-value storage (memory, cookies, JSON file)
//! - [`fingerprint`]: weak device label from environment signals
//! - [`identity`]: who is voting, and whether they may vote on a post
//! - [`app`]: single state struct with one update cycle
//! - [`view`]: what to draw
//! - [`remote`]: the data service over HTTP/websocket
//!
//! The vote gate runs here and only here. Swapping it for server-side authorization means
//! replacing [`identity::IdentityTracker`] behind [`app::App`]; the rest stays as is.

pub mod app;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod remote;
pub mod store;
pub mod theme;
pub mod view;

pub use app::{Action, App, AppState};
pub use error::ClientError;
pub use identity::{DenyReason, IdentityMode, IdentityTracker, VoteDecision};
pub use remote::RemoteDatabase;
pub use store::{CookieJar, FileStore, LocalStore, MemoryStore};
