use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Publishes the current time on a watch channel once per tick. The channel
/// holds the construction time until the first tick, and published values
/// never go backwards even if the wall clock does.
pub struct Clock {
    period: Duration,
    sender: Arc<watch::Sender<DateTime<Utc>>>,
    now_provider: NowProvider,
    task: Option<TickTask>,
}

struct TickTask {
    join_handle: JoinHandle<()>,
    stop_tx: oneshot::Sender<()>,
}

impl Clock {
    pub fn new(period: Duration) -> Self {
        Self::with_now_provider(period, Arc::new(Utc::now))
    }

    pub fn with_now_provider(period: Duration, now_provider: NowProvider) -> Self {
        let (sender, _) = watch::channel(now_provider());
        Self {
            period,
            sender: Arc::new(sender),
            now_provider,
            task: None,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.sender.borrow()
    }

    /// Receivers see the latest value immediately and every tick after it.
    /// Dropping the receiver detaches the consumer.
    pub fn subscribe(&self) -> watch::Receiver<DateTime<Utc>> {
        self.sender.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Starts ticking. Calling it while already running does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let sender = Arc::clone(&self.sender);
        let now_provider = Arc::clone(&self.now_provider);
        let period = self.period;
        let (stop_tx, stop_rx) = oneshot::channel();

        let join_handle = tokio::spawn(async move {
            tick_loop(period, sender, now_provider, stop_rx).await;
        });
        self.task = Some(TickTask { join_handle, stop_tx });
    }

    /// Stops ticking and waits for the background task to finish, so no
    /// value is published after this returns. The clock can be started again.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if task.stop_tx.send(()).is_ok() {
            if let Err(error) = task.join_handle.await {
                tracing::warn!(%error, "clock task ended abnormally");
            }
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.join_handle.abort();
        }
    }
}

async fn tick_loop(
    period: Duration,
    sender: Arc<watch::Sender<DateTime<Utc>>>,
    now_provider: NowProvider,
    mut stop: oneshot::Receiver<()>,
) {
    tracing::debug!(?period, "clock started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = now_provider();
                sender.send_modify(|current| {
                    if now > *current {
                        *current = now;
                    }
                });
            }
            _ = &mut stop => {
                tracing::debug!("clock stopped");
                return;
            }
        }
    }
}
