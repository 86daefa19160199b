use crate::application::error::DashboardError;
use crate::domain::models::EventCollection;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type RequestId = u64;

#[derive(Debug)]
pub struct RefreshOutcome {
    pub request_id: RequestId,
    pub calendar_id: String,
    pub result: Result<EventCollection, DashboardError>,
}

/// Runs calendar fetches in the background and hands their results back in
/// issue order: a completion older than one already delivered is dropped, so
/// a slow early fetch can never overwrite a newer one.
pub struct RefreshController {
    next_request_id: RequestId,
    latest_delivered: Option<RequestId>,
    shutdown: CancellationToken,
    completions_tx: mpsc::UnboundedSender<RefreshOutcome>,
    completions_rx: mpsc::UnboundedReceiver<RefreshOutcome>,
}

impl Default for RefreshController {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshController {
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            next_request_id: 1,
            latest_delivered: None,
            shutdown: CancellationToken::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Spawns `fetch` and returns its request id. Fetches issued after
    /// `shutdown` are cancelled before they run.
    pub fn issue<F>(&mut self, calendar_id: impl Into<String>, fetch: F) -> RequestId
    where
        F: Future<Output = Result<EventCollection, DashboardError>> + Send + 'static,
    {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let calendar_id = calendar_id.into();
        let cancel = self.shutdown.child_token();
        let completions_tx = self.completions_tx.clone();
        tracing::debug!(request_id, %calendar_id, "refresh issued");

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(request_id, "refresh cancelled");
                }
                result = fetch => {
                    let _ = completions_tx.send(RefreshOutcome { request_id, calendar_id, result });
                }
            }
        });

        request_id
    }

    /// Waits for the next completion that is not superseded.
    pub async fn next_completion(&mut self) -> Option<RefreshOutcome> {
        loop {
            let outcome = self.completions_rx.recv().await?;
            if self.accept(outcome.request_id) {
                return Some(outcome);
            }
            tracing::debug!(request_id = outcome.request_id, "dropping stale refresh result");
        }
    }

    fn accept(&mut self, request_id: RequestId) -> bool {
        if self.latest_delivered.is_some_and(|latest| request_id < latest) {
            return false;
        }
        self.latest_delivered = Some(request_id);
        true
    }

    /// Cancels every in-flight fetch; their results are never delivered.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
