use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::{debug, warn};

use crate::{
    database::Subscription,
    models::{ChangeEvent, ChangeFilter},
};

const DEFAULT_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 64;

/// In-process fan-out of change events.
///
/// Slow subscribers that fall behind skip the missed events; listeners reload whole
/// lists, so a gap only delays a refresh.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "published change event"),
            Err(broadcast::error::SendError(event)) => {
                debug!(table = %event.table, id = event.id, "no subscribers for change event")
            }
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        let mut source = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if !filter.matches(&event) {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, table = %filter.table, "subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(filter, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
