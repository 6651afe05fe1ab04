use std::sync::Arc;

use tokio::sync::watch;
use tracing::{Instrument, error, info_span};

use super::{RematchScope, RematchSummary, RematchTrigger, Rematcher};
use crate::run_id;

#[derive(Debug, Clone, PartialEq)]
pub enum RematchJobStatus {
    Running,
    Completed(RematchSummary),
    Failed(String),
}

impl RematchJobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, RematchJobStatus::Running)
    }
}

/// Handle to a background rematch: poll with [`status`](Self::status) or
/// await with [`wait`](Self::wait).
#[derive(Debug)]
pub struct RematchHandle {
    run_id: String,
    status: watch::Receiver<RematchJobStatus>,
}

impl RematchHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> RematchJobStatus {
        self.status.borrow().clone()
    }

    pub async fn wait(mut self) -> RematchJobStatus {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_finished() {
                return current;
            }
            if self.status.changed().await.is_err() {
                // Sender dropped without a final status: the task panicked
                // or was aborted.
                let last = self.status.borrow().clone();
                return if last.is_finished() {
                    last
                } else {
                    RematchJobStatus::Failed("rematch job ended without a result".to_string())
                };
            }
        }
    }
}

impl Rematcher {
    /// Runs [`Rematcher::rematch`] on the tokio runtime under a fresh run id.
    pub fn spawn(self: &Arc<Self>, scope: RematchScope, trigger: RematchTrigger) -> RematchHandle {
        let run_id = run_id::generate();
        let (tx, rx) = watch::channel(RematchJobStatus::Running);
        let rematcher = Arc::clone(self);
        let span = info_span!("rematch_job", run_id = %run_id, trigger = trigger.as_ref());

        tokio::spawn(
            async move {
                let status = match rematcher.rematch(scope, trigger).await {
                    Ok(summary) => RematchJobStatus::Completed(summary),
                    Err(err) => {
                        error!(error = %err, "rematch job failed");
                        RematchJobStatus::Failed(err.to_string())
                    }
                };
                let _ = tx.send(status);
            }
            .instrument(span),
        );

        RematchHandle { run_id, status: rx }
    }
}
