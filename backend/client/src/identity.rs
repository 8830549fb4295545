//! # Identity
//!
//! Best-effort answer to "who is this visitor", and the upvote gate built on it.
//!
//! ## Signals
//!
//! - client id: random UUID v4, created once per store
//! - device id: [fingerprint](crate::fingerprint) of the environment, created once per store
//! - email: submitted with a post, the strongest signal when present
//!
//! ## Records
//!
//! Votes and own posts are JSON arrays of markers under [`VOTED_KEY`] and [`OWN_POSTS_KEY`].
//! Each marker stores every signal known at the time plus the post id, so any later scheme
//! can still match it.
//!
//! A marker belongs to the current visitor when the post id matches and either
//! - both carry an email and the emails are equal, or
//! - the marker has no email and its client id or device id equals the current one.
//!
//! ## Gate
//!
//! [`IdentityTracker::can_vote_on_post`] checks, in order: identity known, not own post,
//! not already voted. Missing identity data denies. A record list that fails to parse is
//! read as empty.
//!
//! None of this is enforced by the data service.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use board::PostId;

use crate::{fingerprint::DeviceSignals, store::LocalStore};

pub const CLIENT_ID_KEY: &str = "feedbackwall.client_id";
pub const DEVICE_ID_KEY: &str = "feedbackwall.device_id";
pub const EMAIL_KEY: &str = "feedbackwall.user_email";
pub const VOTED_KEY: &str = "feedbackwall.voted";
pub const OWN_POSTS_KEY: &str = "feedbackwall.own_posts";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMode {
    /// Voting needs an email submitted with an earlier post.
    #[default]
    Email,
    /// Client id and device id are enough to vote.
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_id: String,
    pub device_id: String,
    pub email: Option<String>,
}

impl Identity {
    fn owns(&self, marker: &Marker) -> bool {
        match (&self.email, &marker.email) {
            (Some(email), Some(marked)) => email == marked,
            (None, Some(_)) => false,
            (_, None) => marker.client_id == self.client_id || marker.device_id == self.device_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Marker {
    client_id: String,
    device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    post_id: PostId,
    /// Milliseconds since the unix epoch.
    timestamp: i64,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    #[error("Please post with your email first")]
    NoIdentity,

    #[error("You cannot vote on your own post")]
    OwnPost,

    #[error("You have already voted on this post")]
    AlreadyVoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    Allow,
    Deny(DenyReason),
}

impl VoteDecision {
    pub fn is_allowed(self) -> bool {
        self == VoteDecision::Allow
    }
}

pub struct IdentityTracker<S> {
    store: S,
    mode: IdentityMode,
    signals: DeviceSignals,
}

impl<S: LocalStore> IdentityTracker<S> {
    pub fn new(store: S, mode: IdentityMode, signals: DeviceSignals) -> Self {
        Self {
            store,
            mode,
            signals,
        }
    }

    pub fn mode(&self) -> IdentityMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Stored client id, created on first use.
    pub fn client_id(&mut self) -> String {
        if let Some(id) = self.store.get(CLIENT_ID_KEY).filter(|id| !id.is_empty()) {
            return id;
        }

        let id = Uuid::new_v4().to_string();
        debug!(client_id = %id, "created client id");
        self.store.set(CLIENT_ID_KEY, &id);
        id
    }

    /// Stored fingerprint, computed from the device signals on first use.
    pub fn device_id(&mut self) -> String {
        if let Some(id) = self.store.get(DEVICE_ID_KEY).filter(|id| !id.is_empty()) {
            return id;
        }

        let id = self.signals.fingerprint();
        debug!(device_id = %id, "created device id");
        self.store.set(DEVICE_ID_KEY, &id);
        id
    }

    /// Makes sure both anonymous ids exist. Called once when the wall starts.
    pub fn ensure(&mut self) {
        self.client_id();
        self.device_id();
    }

    pub fn email(&self) -> Option<String> {
        self.store.get(EMAIL_KEY).filter(|email| !email.is_empty())
    }

    /// Expects an already normalized address.
    pub fn set_email(&mut self, email: &str) {
        self.store.set(EMAIL_KEY, email);
    }

    pub fn clear_email(&mut self) {
        self.store.remove(EMAIL_KEY);
    }

    /// The identity as currently stored, without creating anything.
    ///
    /// `None` when either anonymous id is missing, or in [`IdentityMode::Email`] when no
    /// email has been recorded.
    pub fn current(&self) -> Option<Identity> {
        let identity = self.stored()?;

        if self.mode == IdentityMode::Email && identity.email.is_none() {
            return None;
        }

        Some(identity)
    }

    /// Whatever signals are stored, regardless of mode. Markers are matched against this.
    fn stored(&self) -> Option<Identity> {
        Some(Identity {
            client_id: self.store.get(CLIENT_ID_KEY).filter(|id| !id.is_empty())?,
            device_id: self.store.get(DEVICE_ID_KEY).filter(|id| !id.is_empty())?,
            email: self.email(),
        })
    }

    pub fn has_voted(&self, post_id: PostId) -> bool {
        self.is_marked(VOTED_KEY, post_id)
    }

    pub fn mark_voted(&mut self, post_id: PostId) {
        self.mark(VOTED_KEY, post_id);
    }

    pub fn is_own_post(&self, post_id: PostId) -> bool {
        self.is_marked(OWN_POSTS_KEY, post_id)
    }

    pub fn mark_own_post(&mut self, post_id: PostId) {
        self.mark(OWN_POSTS_KEY, post_id);
    }

    pub fn can_vote_on_post(&self, post_id: PostId) -> VoteDecision {
        if self.current().is_none() {
            return VoteDecision::Deny(DenyReason::NoIdentity);
        }

        if self.is_own_post(post_id) {
            return VoteDecision::Deny(DenyReason::OwnPost);
        }

        if self.has_voted(post_id) {
            return VoteDecision::Deny(DenyReason::AlreadyVoted);
        }

        VoteDecision::Allow
    }

    fn markers(&self, key: &str) -> Vec<Marker> {
        let Some(raw) = self.store.get(key) else {
            return Vec::new();
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!("Treating malformed {key} as empty: {e}");
            Vec::new()
        })
    }

    fn is_marked(&self, key: &str, post_id: PostId) -> bool {
        let Some(identity) = self.stored() else {
            return false;
        };

        self.markers(key)
            .iter()
            .any(|marker| marker.post_id == post_id && identity.owns(marker))
    }

    /// Markers are keyed by the anonymous ids even in email mode, so both are created here.
    fn mark(&mut self, key: &str, post_id: PostId) {
        let marker = Marker {
            client_id: self.client_id(),
            device_id: self.device_id(),
            email: self.email(),
            post_id,
            timestamp: Utc::now().timestamp_millis(),
        };

        let mut markers = self.markers(key);
        markers.push(marker);

        match serde_json::to_string(&markers) {
            Ok(raw) => self.store.set(key, &raw),
            Err(e) => warn!("Failed to record {key} for post {post_id}: {e}"),
        }
    }
}
