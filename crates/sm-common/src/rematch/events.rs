use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{ListingSelection, RematchHandle, RematchScope, RematchTrigger, Rematcher};
use crate::{ListingId, ProfileId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchingEvent {
    ProfileChanged { profile_id: ProfileId },
    ListingsChanged { listing_ids: Vec<ListingId> },
}

impl MatchingEvent {
    /// The rematch this event calls for; `None` when there is nothing to do.
    pub fn rematch_job(&self) -> Option<(RematchScope, RematchTrigger)> {
        match self {
            MatchingEvent::ProfileChanged { profile_id } => Some((
                RematchScope::SingleProfile(*profile_id),
                RematchTrigger::ProfileUpdated,
            )),
            MatchingEvent::ListingsChanged { listing_ids } if listing_ids.is_empty() => None,
            MatchingEvent::ListingsChanged { listing_ids } => Some((
                RematchScope::AllProfiles(ListingSelection::Only(listing_ids.clone())),
                RematchTrigger::ListingsIngested,
            )),
        }
    }
}

/// Fan-out of matching triggers. Publishing never blocks; with no
/// subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MatchingEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: MatchingEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "no matching listeners; event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchingEvent> {
        self.tx.subscribe()
    }
}

/// Spawns a listener that turns bus events into background rematch jobs.
/// Handles of spawned jobs are forwarded on the returned channel; dropping
/// the receiver does not stop the listener.
pub fn listen(
    bus: &EventBus,
    rematcher: Arc<Rematcher>,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<RematchHandle>) {
    let mut rx = bus.subscribe();
    let (handles_tx, handles_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        loop {
            let job = match rx.recv().await {
                Ok(event) => event.rematch_job(),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Upserts are idempotent, so a full pass covers whatever
                    // was missed.
                    warn!(missed, "matching listener lagged; scheduling full rematch");
                    Some((
                        RematchScope::AllProfiles(ListingSelection::All),
                        RematchTrigger::Manual,
                    ))
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Some((scope, trigger)) = job else {
                continue;
            };
            let handle = rematcher.spawn(scope, trigger);
            info!(run_id = handle.run_id(), trigger = trigger.as_ref(), "rematch scheduled");
            let _ = handles_tx.send(handle);
        }
        debug!("matching event bus closed; listener stopped");
    });

    (task, handles_rx)
}
