//! # Wall Application
//!
//! All UI state lives in one [`AppState`] and changes only through [`App::dispatch`].
//!
//! Data calls are awaited inline. Remote changes arrive as [`Action::RemoteChange`] and
//! reload the whole affected list; nothing is merged.
//!
//! Failures never end the session: submit errors show next to the form, vote denials and
//! comment errors show as notices, load failures are logged and keep the last list.
use std::sync::Arc;

use board::{
    BoardError, ChangeEvent, ChangeFilter, Comment, Database, Feedback, Limits, NewComment,
    NewFeedback, PostId, SortOrder, Subscription, Table,
    validation::{matches_query, normalize_author, normalize_email, validate_comment, validate_message},
};
use tracing::{debug, info, warn};

use crate::{
    identity::{IdentityTracker, VoteDecision},
    store::LocalStore,
    theme::Theme,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    pub message: String,
    pub author: String,
    pub email: String,
}

impl Composer {
    pub fn clear(&mut self) {
        self.message.clear();
        self.author.clear();
        self.email.clear();
    }
}

/// The comment modal for one post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thread {
    pub post_id: PostId,
    pub comments: Vec<Comment>,
    pub draft: String,
    pub author: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub theme: Theme,
    pub order: SortOrder,
    pub query: String,
    pub items: Vec<Feedback>,
    pub loading: bool,
    pub composer: Composer,
    pub form_error: Option<String>,
    pub notice: Option<String>,
    pub thread: Option<Thread>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ToggleTheme,
    SetOrder(SortOrder),
    SetQuery(String),
    EditMessage(String),
    EditAuthor(String),
    EditEmail(String),
    Submit,
    /// Drops the recorded email; in email mode voting is closed again until the next post.
    ForgetEmail,
    Upvote(PostId),
    OpenComments(PostId),
    CloseComments,
    EditComment(String),
    EditCommentAuthor(String),
    SubmitComment,
    Reload,
    RemoteChange(ChangeEvent),
}

pub struct App<S> {
    state: AppState,
    identity: IdentityTracker<S>,
    database: Arc<dyn Database>,
    limits: Limits,
}

impl<S: LocalStore> App<S> {
    /// Restores the theme and makes sure the visitor has anonymous ids. Nothing is loaded
    /// until the first [`Action::Reload`].
    pub fn new(database: Arc<dyn Database>, mut identity: IdentityTracker<S>, limits: Limits) -> Self {
        identity.ensure();

        let state = AppState {
            theme: Theme::load(identity.store()),
            loading: true,
            ..AppState::default()
        };

        Self {
            state,
            identity,
            database,
            limits,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn identity(&self) -> &IdentityTracker<S> {
        &self.identity
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Loaded posts matching the search query, in load order.
    pub fn visible(&self) -> Vec<&Feedback> {
        self.state
            .items
            .iter()
            .filter(|item| matches_query(item, &self.state.query))
            .collect()
    }

    pub async fn subscribe_feedback(&self) -> Result<Subscription, BoardError> {
        self.database.subscribe(ChangeFilter::feedback()).await
    }

    pub async fn subscribe_comments(&self, post_id: PostId) -> Result<Subscription, BoardError> {
        self.database.subscribe(ChangeFilter::comments(post_id)).await
    }

    pub async fn dispatch(&mut self, action: Action) {
        debug!(?action, "dispatch");

        match action {
            Action::ToggleTheme => {
                self.state.theme = self.state.theme.toggled();
                self.state.theme.save(self.identity.store_mut());
            }
            Action::SetOrder(order) => {
                self.state.order = order;
                self.load().await;
            }
            Action::SetQuery(query) => self.state.query = query,
            Action::EditMessage(message) => self.state.composer.message = message,
            Action::EditAuthor(author) => self.state.composer.author = author,
            Action::EditEmail(email) => self.state.composer.email = email,
            Action::Submit => self.submit().await,
            Action::ForgetEmail => {
                self.identity.clear_email();
                info!("Forgot recorded email");
            }
            Action::Upvote(id) => self.upvote(id).await,
            Action::OpenComments(post_id) => {
                self.state.thread = Some(Thread {
                    post_id,
                    ..Thread::default()
                });
                self.load_comments().await;
            }
            Action::CloseComments => self.state.thread = None,
            Action::EditComment(draft) => {
                if let Some(thread) = self.state.thread.as_mut() {
                    thread.draft = draft;
                }
            }
            Action::EditCommentAuthor(author) => {
                if let Some(thread) = self.state.thread.as_mut() {
                    thread.author = author;
                }
            }
            Action::SubmitComment => self.submit_comment().await,
            Action::Reload => self.load().await,
            Action::RemoteChange(event) => self.remote_change(event).await,
        }
    }

    async fn load(&mut self) {
        self.state.loading = true;

        match self.database.list_feedback(self.state.order).await {
            Ok(items) => self.state.items = items,
            Err(e) => warn!("Failed to load feedback: {e}"),
        }

        self.state.loading = false;
    }

    async fn submit(&mut self) {
        let composer = &self.state.composer;

        let checked = validate_message(&composer.message, self.limits.max_message_len).and_then(|message| {
            Ok(NewFeedback {
                message,
                author: normalize_author(&composer.author),
                email: normalize_email(&composer.email)?,
            })
        });

        let new = match checked {
            Ok(new) => new,
            Err(e) => {
                self.state.form_error = Some(e.to_string());
                return;
            }
        };
        self.state.form_error = None;

        let email = new.email.clone();

        match self.database.insert_feedback(new).await {
            Ok(record) => {
                info!(id = record.id, "Posted feedback");

                if let Some(email) = email.as_deref() {
                    self.identity.set_email(email);
                }
                self.identity.mark_own_post(record.id);
                self.state.composer.clear();

                self.load().await;
            }
            Err(e) => self.state.form_error = Some(e.to_string()),
        }
    }

    async fn upvote(&mut self, id: PostId) {
        if let VoteDecision::Deny(reason) = self.identity.can_vote_on_post(id) {
            debug!(id, %reason, "Vote denied");
            self.state.notice = Some(reason.to_string());
            return;
        }
        self.state.notice = None;

        match self.database.upvote(id).await {
            Ok(record) => {
                self.identity.mark_voted(id);

                if let Some(item) = self.state.items.iter_mut().find(|item| item.id == id) {
                    *item = record;
                }
            }
            Err(e) => {
                warn!("Failed to upvote {id}: {e}");
                self.state.notice = Some(e.to_string());
            }
        }
    }

    async fn load_comments(&mut self) {
        let Some(post_id) = self.state.thread.as_ref().map(|thread| thread.post_id) else {
            return;
        };

        match self.database.list_comments(post_id).await {
            Ok(comments) => {
                if let Some(thread) = self.state.thread.as_mut().filter(|t| t.post_id == post_id) {
                    thread.comments = comments;
                }
            }
            Err(e) => warn!("Failed to load comments for {post_id}: {e}"),
        }
    }

    async fn submit_comment(&mut self) {
        let Some(thread) = self.state.thread.as_mut() else {
            return;
        };

        let content = match validate_comment(&thread.draft, self.limits.max_comment_len) {
            Ok(content) => content,
            Err(e) => {
                thread.error = Some(e.to_string());
                return;
            }
        };
        thread.error = None;

        let new = NewComment {
            post_id: thread.post_id,
            content,
            author: normalize_author(&thread.author),
        };

        match self.database.insert_comment(new).await {
            Ok(comment) => {
                info!(id = comment.id, post_id = comment.post_id, "Posted comment");
                if let Some(thread) = self.state.thread.as_mut() {
                    thread.draft.clear();
                }
                self.load_comments().await;
            }
            Err(e) => {
                warn!("Failed to post comment: {e}");
                if let Some(thread) = self.state.thread.as_mut() {
                    thread.error = Some(e.to_string());
                }
            }
        }
    }

    async fn remote_change(&mut self, event: ChangeEvent) {
        match event.table {
            Table::Feedback => self.load().await,
            Table::Comments => {
                let open = self.state.thread.as_ref().map(|thread| thread.post_id);
                if open.is_some() && open == event.post_id {
                    self.load_comments().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use board::{ChangeKind, MemoryDatabase};

    use super::*;
    use crate::{
        fingerprint::DeviceSignals,
        identity::{DenyReason, IdentityMode},
        store::MemoryStore,
    };

    /// Counts every call that reaches the data API.
    #[derive(Default)]
    struct Counting {
        inner: MemoryDatabase,
        calls: AtomicUsize,
    }

    impl Counting {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Database for Counting {
        async fn list_feedback(&self, order: SortOrder) -> Result<Vec<Feedback>, BoardError> {
            self.hit();
            self.inner.list_feedback(order).await
        }

        async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, BoardError> {
            self.hit();
            self.inner.insert_feedback(new).await
        }

        async fn upvote(&self, id: PostId) -> Result<Feedback, BoardError> {
            self.hit();
            self.inner.upvote(id).await
        }

        async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, BoardError> {
            self.hit();
            self.inner.list_comments(post_id).await
        }

        async fn insert_comment(&self, new: NewComment) -> Result<Comment, BoardError> {
            self.hit();
            self.inner.insert_comment(new).await
        }

        async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, BoardError> {
            self.inner.subscribe(filter).await
        }
    }

    fn signals() -> DeviceSignals {
        DeviceSignals {
            user_agent: "test".to_string(),
            language: "en".to_string(),
            screen_width: 800,
            screen_height: 600,
            timezone_offset_minutes: 0,
            canvas: "c".to_string(),
        }
    }

    fn make_app(database: Arc<dyn Database>, mode: IdentityMode) -> App<MemoryStore> {
        App::new(
            database,
            IdentityTracker::new(MemoryStore::new(), mode, signals()),
            Limits::default(),
        )
    }

    async fn seed(database: &dyn Database, message: &str) -> Feedback {
        database
            .insert_feedback(NewFeedback {
                message: message.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_too_long_rejected_before_network() {
        let database = Arc::new(Counting::default());
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::EditMessage("z".repeat(501))).await;
        app.dispatch(Action::Submit).await;

        assert_eq!(database.calls(), 0);
        assert_eq!(app.state().form_error.as_deref(), Some("Keep it under 500 characters."));
        assert_eq!(app.state().composer.message.len(), 501);
    }

    #[tokio::test]
    async fn test_blank_rejected() {
        let database = Arc::new(Counting::default());
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::EditMessage("   \n ".to_string())).await;
        app.dispatch(Action::Submit).await;

        assert_eq!(database.calls(), 0);
        assert_eq!(app.state().form_error.as_deref(), Some("Please enter a message."));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let database = Arc::new(Counting::default());
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::EditMessage("hello".to_string())).await;
        app.dispatch(Action::EditEmail("not-an-email".to_string())).await;
        app.dispatch(Action::Submit).await;

        assert_eq!(database.calls(), 0);
        assert_eq!(app.state().form_error.as_deref(), Some("Please enter a valid email."));
    }

    #[tokio::test]
    async fn test_successful_post_clears_composer() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::EditMessage("  Great venue ".to_string())).await;
        app.dispatch(Action::EditAuthor("Sam".to_string())).await;
        app.dispatch(Action::EditEmail("Sam@Example.com".to_string())).await;
        app.dispatch(Action::Submit).await;

        let state = app.state();
        assert_eq!(state.composer, Composer::default());
        assert_eq!(state.form_error, None);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].message, "Great venue");

        let id = state.items[0].id;
        assert!(app.identity().is_own_post(id));
        assert_eq!(app.identity().email().as_deref(), Some("sam@example.com"));
    }

    #[tokio::test]
    async fn test_upvote_gate() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = make_app(database.clone(), IdentityMode::Email);

        let other = seed(database.as_ref(), "someone else's idea").await;
        app.dispatch(Action::Reload).await;

        // No email yet.
        app.dispatch(Action::Upvote(other.id)).await;
        assert_eq!(
            app.state().notice.as_deref(),
            Some(DenyReason::NoIdentity.to_string().as_str())
        );
        assert_eq!(app.state().items[0].votes, 0);

        // Posting with an email establishes identity and ownership.
        app.dispatch(Action::EditMessage("mine".to_string())).await;
        app.dispatch(Action::EditEmail("me@example.com".to_string())).await;
        app.dispatch(Action::Submit).await;
        let mine = app.state().items.iter().find(|f| f.message == "mine").unwrap().id;

        app.dispatch(Action::Upvote(mine)).await;
        assert_eq!(
            app.state().notice.as_deref(),
            Some("You cannot vote on your own post")
        );

        app.dispatch(Action::Upvote(other.id)).await;
        assert_eq!(app.state().notice, None);
        let voted = app.state().items.iter().find(|f| f.id == other.id).unwrap();
        assert_eq!(voted.votes, 1);

        app.dispatch(Action::Upvote(other.id)).await;
        assert_eq!(
            app.state().notice.as_deref(),
            Some("You have already voted on this post")
        );

        let stored = database.list_feedback(SortOrder::New).await.unwrap();
        let stored = stored.iter().find(|f| f.id == other.id).unwrap();
        assert_eq!(stored.votes, 1);
    }

    #[tokio::test]
    async fn test_forget_email_closes_voting() {
        let database = Arc::new(MemoryDatabase::new());
        let other = seed(database.as_ref(), "open question").await;
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::EditMessage("hello".to_string())).await;
        app.dispatch(Action::EditEmail("me@example.com".to_string())).await;
        app.dispatch(Action::Submit).await;
        assert!(app.identity().can_vote_on_post(other.id).is_allowed());

        app.dispatch(Action::ForgetEmail).await;
        assert_eq!(app.identity().email(), None);

        app.dispatch(Action::Upvote(other.id)).await;
        assert_eq!(
            app.state().notice.as_deref(),
            Some("Please post with your email first")
        );
    }

    #[tokio::test]
    async fn test_anonymous_mode_votes_without_email() {
        let database = Arc::new(MemoryDatabase::new());
        let post = seed(database.as_ref(), "anonymous vote").await;
        let mut app = make_app(database.clone(), IdentityMode::Anonymous);

        app.dispatch(Action::Reload).await;
        app.dispatch(Action::Upvote(post.id)).await;

        assert_eq!(app.state().items[0].votes, 1);
        assert!(app.identity().has_voted(post.id));
    }

    #[tokio::test]
    async fn test_order_and_search() {
        let database = Arc::new(MemoryDatabase::new());
        let first = seed(database.as_ref(), "Rust workshop").await;
        seed(database.as_ref(), "Coffee was cold").await;
        database.upvote(first.id).await.unwrap();

        let mut app = make_app(database.clone(), IdentityMode::Email);
        app.dispatch(Action::SetOrder(SortOrder::Top)).await;
        assert_eq!(app.state().items[0].id, first.id);
        assert!(!app.state().loading);

        app.dispatch(Action::SetQuery("COFFEE".to_string())).await;
        let visible = app.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message, "Coffee was cold");
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = make_app(database, IdentityMode::Email);
        assert_eq!(app.state().theme, Theme::Light);

        app.dispatch(Action::ToggleTheme).await;
        assert_eq!(app.state().theme, Theme::Dark);
        assert_eq!(Theme::load(app.identity().store()), Theme::Dark);
    }

    #[tokio::test]
    async fn test_comments_flow() {
        let database = Arc::new(MemoryDatabase::new());
        let post = seed(database.as_ref(), "thread").await;
        let mut app = make_app(database.clone(), IdentityMode::Email);

        app.dispatch(Action::OpenComments(post.id)).await;
        app.dispatch(Action::EditComment("x".repeat(301))).await;
        app.dispatch(Action::SubmitComment).await;
        assert_eq!(
            app.state().thread.as_ref().unwrap().error.as_deref(),
            Some("Keep comments under 300 characters.")
        );

        app.dispatch(Action::EditComment(" +1 ".to_string())).await;
        app.dispatch(Action::EditCommentAuthor(" Lee ".to_string())).await;
        app.dispatch(Action::SubmitComment).await;

        let thread = app.state().thread.as_ref().unwrap();
        assert_eq!(thread.error, None);
        assert_eq!(thread.draft, "");
        assert_eq!(thread.comments.len(), 1);
        assert_eq!(thread.comments[0].content, "+1");
        assert_eq!(thread.comments[0].author.as_deref(), Some("Lee"));

        app.dispatch(Action::CloseComments).await;
        assert!(app.state().thread.is_none());
    }

    #[tokio::test]
    async fn test_remote_change_reloads() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = make_app(database.clone(), IdentityMode::Email);
        app.dispatch(Action::Reload).await;
        assert!(app.state().items.is_empty());

        let mut feed = app.subscribe_feedback().await.unwrap();
        let post = seed(database.as_ref(), "from another tab").await;

        let event = feed.next().await.unwrap();
        assert_eq!(event, ChangeEvent::feedback(ChangeKind::Insert, post.id));

        app.dispatch(Action::RemoteChange(event)).await;
        assert_eq!(app.state().items.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_comment_reloads_open_thread_only() {
        let database = Arc::new(MemoryDatabase::new());
        let a = seed(database.as_ref(), "a").await;
        let b = seed(database.as_ref(), "b").await;
        let mut app = make_app(database.clone(), IdentityMode::Email);
        app.dispatch(Action::OpenComments(a.id)).await;

        let comment = database
            .insert_comment(NewComment {
                post_id: b.id,
                content: "elsewhere".to_string(),
                author: None,
            })
            .await
            .unwrap();
        app.dispatch(Action::RemoteChange(ChangeEvent::comment(comment.id, b.id))).await;
        assert!(app.state().thread.as_ref().unwrap().comments.is_empty());

        let comment = database
            .insert_comment(NewComment {
                post_id: a.id,
                content: "here".to_string(),
                author: None,
            })
            .await
            .unwrap();
        app.dispatch(Action::RemoteChange(ChangeEvent::comment(comment.id, a.id))).await;
        assert_eq!(app.state().thread.as_ref().unwrap().comments.len(), 1);
    }

    #[tokio::test]
    async fn test_upvote_unknown_post_shows_notice() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = make_app(database, IdentityMode::Anonymous);

        app.dispatch(Action::Upvote(404)).await;
        assert!(app.state().notice.is_some());
        assert!(!app.identity().has_voted(404));
    }
}
