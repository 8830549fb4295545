//! # View
//!
//! Read-only projection of the app state for display. Message text is HTML-escaped in the
//! card fields; the plain-text rendering used by the CLI prints it raw.
use std::fmt;

use board::{
    PostId,
    validation::{escape_html, preview, relative_time},
};
use chrono::{DateTime, Utc};

use crate::{app::App, store::LocalStore, theme::Theme};

pub const TITLE: &str = "Feedback Wall";
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: PostId,
    pub preview_html: String,
    /// Full message, present only when the preview was cut ("Read more").
    pub full_html: Option<String>,
    pub text: String,
    pub author: String,
    pub posted: String,
    pub votes: u32,
    pub vote_label: String,
    /// Button state; clicking is still gated again on dispatch.
    pub can_vote: bool,
    pub own: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Loading,
    Empty(String),
    Cards(Vec<Card>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub author: String,
    pub content_html: String,
    pub text: String,
    pub posted: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub post_id: PostId,
    pub comments: Vec<CommentLine>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallView {
    pub theme: Theme,
    pub theme_button: String,
    pub form_error: Option<String>,
    pub notice: Option<String>,
    pub body: Body,
    pub thread: Option<ThreadView>,
}

pub fn render<S: LocalStore>(app: &App<S>, now: DateTime<Utc>) -> WallView {
    let state = app.state();
    let identity = app.identity();

    let body = if state.loading {
        Body::Loading
    } else {
        let cards: Vec<Card> = app
            .visible()
            .into_iter()
            .map(|item| {
                let (short, cut) = preview(&item.message);
                let own = identity.is_own_post(item.id);

                Card {
                    id: item.id,
                    preview_html: escape_html(&short),
                    full_html: cut.then(|| escape_html(&item.message)),
                    text: item.message.clone(),
                    author: item.author.clone().unwrap_or_else(|| ANONYMOUS.to_string()),
                    posted: relative_time(item.created_at, now),
                    votes: item.votes,
                    vote_label: format!("▲ Upvote {}", item.votes),
                    can_vote: identity.can_vote_on_post(item.id).is_allowed(),
                    own,
                }
            })
            .collect();

        if cards.is_empty() {
            let reason = if state.query.trim().is_empty() {
                "yet"
            } else {
                "matches your search"
            };
            Body::Empty(format!("No feedback {reason}."))
        } else {
            Body::Cards(cards)
        }
    };

    let thread = state.thread.as_ref().map(|thread| ThreadView {
        post_id: thread.post_id,
        comments: thread
            .comments
            .iter()
            .map(|comment| CommentLine {
                author: comment.author.clone().unwrap_or_else(|| ANONYMOUS.to_string()),
                content_html: escape_html(&comment.content),
                text: comment.content.clone(),
                posted: relative_time(comment.created_at, now),
            })
            .collect(),
        error: thread.error.clone(),
    });

    let theme_button = match state.theme {
        Theme::Light => "Dark Mode",
        Theme::Dark => "Light Mode",
    };

    WallView {
        theme: state.theme,
        theme_button: theme_button.to_string(),
        form_error: state.form_error.clone(),
        notice: state.notice.clone(),
        body,
        thread,
    }
}

impl fmt::Display for WallView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{TITLE} [{}]", self.theme)?;

        if let Some(error) = &self.form_error {
            writeln!(f, "! {error}")?;
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "* {notice}")?;
        }

        match &self.body {
            Body::Loading => writeln!(f, "Loading...")?,
            Body::Empty(message) => writeln!(f, "{message}")?,
            Body::Cards(cards) => {
                for card in cards {
                    let marker = if card.own { " (yours)" } else { "" };
                    writeln!(f)?;
                    writeln!(f, "#{} {}", card.id, card.text)?;
                    writeln!(
                        f,
                        "   {} · {} · {}{marker}",
                        card.author, card.posted, card.vote_label
                    )?;
                }
            }
        }

        if let Some(thread) = &self.thread {
            writeln!(f)?;
            writeln!(f, "Comments on #{}", thread.post_id)?;
            if thread.comments.is_empty() {
                writeln!(f, "   No comments yet.")?;
            }
            for comment in &thread.comments {
                writeln!(f, "   {} ({}): {}", comment.author, comment.posted, comment.text)?;
            }
            if let Some(error) = &thread.error {
                writeln!(f, "! {error}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use board::{Database, Limits, MemoryDatabase, NewFeedback};

    use super::*;
    use crate::{
        app::Action,
        fingerprint::DeviceSignals,
        identity::{IdentityMode, IdentityTracker},
        store::MemoryStore,
    };

    fn signals() -> DeviceSignals {
        DeviceSignals {
            user_agent: "view".to_string(),
            language: "en".to_string(),
            screen_width: 1,
            screen_height: 1,
            timezone_offset_minutes: 0,
            canvas: String::new(),
        }
    }

    async fn app_with(database: Arc<MemoryDatabase>) -> App<MemoryStore> {
        let mut app = App::new(
            database,
            IdentityTracker::new(MemoryStore::new(), IdentityMode::Anonymous, signals()),
            Limits::default(),
        );
        app.dispatch(Action::Reload).await;
        app
    }

    #[tokio::test]
    async fn test_loading_before_first_reload() {
        let app = App::new(
            Arc::new(MemoryDatabase::new()),
            IdentityTracker::new(MemoryStore::new(), IdentityMode::Anonymous, signals()),
            Limits::default(),
        );

        assert_eq!(render(&app, Utc::now()).body, Body::Loading);
    }

    #[tokio::test]
    async fn test_empty_messages() {
        let mut app = app_with(Arc::new(MemoryDatabase::new())).await;
        assert_eq!(render(&app, Utc::now()).body, Body::Empty("No feedback yet.".to_string()));

        app.dispatch(Action::SetQuery("zzz".to_string())).await;
        assert_eq!(
            render(&app, Utc::now()).body,
            Body::Empty("No feedback matches your search.".to_string())
        );
    }

    #[tokio::test]
    async fn test_card_fields() {
        let database = Arc::new(MemoryDatabase::new());
        database
            .insert_feedback(NewFeedback {
                message: format!("<b>{}</b>", "long ".repeat(40)),
                author: None,
                email: None,
            })
            .await
            .unwrap();

        let mut app = app_with(database).await;
        let view = render(&app, Utc::now());
        let Body::Cards(cards) = &view.body else {
            panic!("expected cards");
        };
        let card = &cards[0];

        assert!(card.preview_html.starts_with("&lt;b&gt;"));
        assert!(card.preview_html.ends_with('…'));
        assert!(card.full_html.as_deref().unwrap().ends_with("&lt;/b&gt;"));
        assert_eq!(card.author, ANONYMOUS);
        assert_eq!(card.vote_label, "▲ Upvote 0");
        assert!(card.can_vote);
        assert!(!card.own);
        assert_eq!(view.theme_button, "Dark Mode");

        app.dispatch(Action::Upvote(card.id)).await;
        let view = render(&app, Utc::now());
        let Body::Cards(cards) = &view.body else {
            panic!("expected cards");
        };
        assert_eq!(cards[0].vote_label, "▲ Upvote 1");
        assert!(!cards[0].can_vote);
    }

    fn cards(view: &WallView) -> &[Card] {
        match &view.body {
            Body::Cards(cards) => cards,
            other => panic!("expected cards, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_email_mode_buttons_follow_gate() {
        let database = Arc::new(MemoryDatabase::new());
        database
            .insert_feedback(NewFeedback {
                message: "someone else".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut app = App::new(
            database,
            IdentityTracker::new(MemoryStore::new(), IdentityMode::Email, signals()),
            Limits::default(),
        );
        app.dispatch(Action::EditMessage("mine, no email".to_string())).await;
        app.dispatch(Action::Submit).await;

        let view = render(&app, Utc::now());
        let cards = cards(&view);
        let mine = cards.iter().find(|c| c.text == "mine, no email").unwrap();
        let other = cards.iter().find(|c| c.text == "someone else").unwrap();

        assert!(mine.own);
        assert!(!mine.can_vote);
        assert!(!other.own);
        assert!(!other.can_vote);
    }

    #[tokio::test]
    async fn test_text_rendering() {
        let database = Arc::new(MemoryDatabase::new());
        let mut app = app_with(database).await;

        app.dispatch(Action::EditMessage("Loved it".to_string())).await;
        app.dispatch(Action::EditAuthor("Kim".to_string())).await;
        app.dispatch(Action::Submit).await;

        let text = render(&app, Utc::now()).to_string();
        assert!(text.starts_with("Feedback Wall [light]"));
        assert!(text.contains("#1 Loved it"));
        assert!(text.contains("Kim · "));
        assert!(text.contains("(yours)"));
    }
}
