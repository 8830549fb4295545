use std::{env, path::PathBuf, sync::Arc};

use board::{Limits, PostId, SortOrder};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client::{
    Action, App, FileStore, IdentityMode, IdentityTracker, RemoteDatabase, fingerprint::DeviceSignals,
    view::render,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

const STORE_FILE: &str = ".feedbackwall.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Post to and browse a feedback wall")]
struct Args {
    /// Data service address.
    #[arg(long, env = "WALL_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Where this visitor's ids, votes and preferences are kept.
    #[arg(long, env = "WALL_STORE")]
    store: Option<PathBuf>,

    /// Allow voting without having posted with an email.
    #[arg(long)]
    anonymous: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the wall.
    List {
        #[arg(long, default_value = "new")]
        order: SortOrder,

        #[arg(long)]
        search: Option<String>,
    },
    /// Post a message.
    Post {
        message: String,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
    Upvote { id: PostId },
    /// Show the comments on a post.
    Comments { id: PostId },
    Comment {
        id: PostId,
        content: String,

        #[arg(long)]
        author: Option<String>,
    },
    /// Stop voting as the email recorded with an earlier post.
    ForgetEmail,
    /// Switch between light and dark.
    Theme,
    /// Print the wall again whenever it changes.
    Watch {
        #[arg(long, default_value = "new")]
        order: SortOrder,
    },
}

fn store_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(STORE_FILE),
        None => PathBuf::from(STORE_FILE),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let store = FileStore::open(store_path(args.store));
    info!("Using store {}", store.path().display());

    let mode = if args.anonymous {
        IdentityMode::Anonymous
    } else {
        IdentityMode::Email
    };
    let identity = IdentityTracker::new(store, mode, DeviceSignals::detect());
    let database = Arc::new(RemoteDatabase::new(&args.url));
    let mut app = App::new(database, identity, Limits::default());

    match args.command {
        Command::List { order, search } => {
            app.dispatch(Action::SetOrder(order)).await;
            if let Some(search) = search {
                app.dispatch(Action::SetQuery(search)).await;
            }
            print!("{}", render(&app, Utc::now()));
        }
        Command::Post {
            message,
            author,
            email,
        } => {
            app.dispatch(Action::EditMessage(message)).await;
            app.dispatch(Action::EditAuthor(author.unwrap_or_default())).await;
            app.dispatch(Action::EditEmail(email.unwrap_or_default())).await;
            app.dispatch(Action::Submit).await;

            if let Some(error) = &app.state().form_error {
                anyhow::bail!("{error}");
            }
            print!("{}", render(&app, Utc::now()));
        }
        Command::Upvote { id } => {
            app.dispatch(Action::Reload).await;
            app.dispatch(Action::Upvote(id)).await;

            if let Some(notice) = &app.state().notice {
                anyhow::bail!("{notice}");
            }
            print!("{}", render(&app, Utc::now()));
        }
        Command::Comments { id } => {
            app.dispatch(Action::Reload).await;
            app.dispatch(Action::OpenComments(id)).await;
            print!("{}", render(&app, Utc::now()));
        }
        Command::Comment {
            id,
            content,
            author,
        } => {
            app.dispatch(Action::Reload).await;
            app.dispatch(Action::OpenComments(id)).await;
            app.dispatch(Action::EditComment(content)).await;
            app.dispatch(Action::EditCommentAuthor(author.unwrap_or_default())).await;
            app.dispatch(Action::SubmitComment).await;

            if let Some(error) = app.state().thread.as_ref().and_then(|t| t.error.as_ref()) {
                anyhow::bail!("{error}");
            }
            print!("{}", render(&app, Utc::now()));
        }
        Command::ForgetEmail => {
            app.dispatch(Action::ForgetEmail).await;
            println!("Email forgotten");
        }
        Command::Theme => {
            app.dispatch(Action::ToggleTheme).await;
            println!("Theme set to {}", app.state().theme);
        }
        Command::Watch { order } => {
            let mut changes = app.subscribe_feedback().await?;
            app.dispatch(Action::SetOrder(order)).await;
            print!("{}", render(&app, Utc::now()));

            while let Some(event) = changes.next().await {
                app.dispatch(Action::RemoteChange(event)).await;
                println!();
                print!("{}", render(&app, Utc::now()));
            }
            info!("Change feed closed");
        }
    }

    Ok(())
}
