//! Background territory painting.
//!
//! The caller allocates a center and makes it durable, then `submit` hands
//! the draft and center to the blocking pool where the terrain is painted.
//! Outcomes come back over a channel and are collected by the owning context
//! with [`CreationPipeline::drain`] or [`CreationPipeline::next_completed`].
//! Nothing in here touches the registry or the allocator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use skyraid_core::creation::TerritoryDraft;
use skyraid_core::types::{ActorId, ColumnPos};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{HostError, Result, TerrainError};
use crate::terrain::TerrainPainter;

/// A finished paint job, ready to be registered.
#[derive(Debug)]
pub struct Completed {
    /// The request.
    pub draft: TerritoryDraft,
    /// Center the job painted.
    pub center: ColumnPos,
    /// Painter result.
    pub painted: std::result::Result<(), TerrainError>,
}

struct Outcome {
    ticket: u64,
    completed: Completed,
}

/// Creation requests in flight.
pub struct CreationPipeline {
    painter: Arc<dyn TerrainPainter>,
    /// Every actor named by an in-flight draft, mapped to its ticket.
    in_flight: HashMap<ActorId, u64>,
    abandoned: HashSet<u64>,
    pending: usize,
    next_ticket: u64,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl std::fmt::Debug for CreationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationPipeline")
            .field("painter", &self.painter.name())
            .field("pending", &self.pending)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl CreationPipeline {
    /// Pipeline painting with `painter`.
    #[must_use]
    pub fn new(painter: Arc<dyn TerrainPainter>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            painter,
            in_flight: HashMap::new(),
            abandoned: HashSet::new(),
            pending: 0,
            next_ticket: 0,
            tx,
            rx,
        }
    }

    /// Whether `actor` is named by an in-flight request.
    #[must_use]
    pub fn is_in_flight(&self, actor: ActorId) -> bool {
        self.in_flight.contains_key(&actor)
    }

    /// The first actor of `draft` that already has a request in flight.
    #[must_use]
    pub fn busy_actor(&self, draft: &TerritoryDraft) -> Option<ActorId> {
        draft.actors().find(|a| self.in_flight.contains_key(a))
    }

    /// Jobs whose outcome has not been collected yet, abandoned ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Start painting `center` for `draft`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `CreationInProgress` naming the first actor of the draft that already
    /// has a request in flight.
    pub fn submit(&mut self, draft: TerritoryDraft, center: ColumnPos) -> Result<()> {
        if let Some(busy) = self.busy_actor(&draft) {
            return Err(HostError::CreationInProgress(busy));
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        for actor in draft.actors() {
            self.in_flight.insert(actor, ticket);
        }
        self.pending += 1;
        debug!(owner = %draft.owner, center = %center, ticket, "Creation submitted");

        let painter = Arc::clone(&self.painter);
        let tx = self.tx.clone();
        let owner = draft.owner;
        let job = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let painted = painter.paint(center);
            debug!(
                owner = %draft.owner,
                center = %center,
                painter = painter.name(),
                elapsed = ?start.elapsed(),
                "Terrain painted"
            );
            Completed {
                draft,
                center,
                painted,
            }
        });

        // A panicking painter still has to release the in-flight actors.
        tokio::spawn(async move {
            let completed = match job.await {
                Ok(completed) => completed,
                Err(e) => {
                    warn!(owner = %owner, center = %center, error = %e, "Creation worker failed");
                    Completed {
                        draft: TerritoryDraft::solo(owner, String::new()),
                        center,
                        painted: Err(TerrainError::Failed(e.to_string())),
                    }
                }
            };
            // Receiver gone means the pipeline was dropped.
            let _ = tx.send(Outcome { ticket, completed });
        });
        Ok(())
    }

    /// Give up on `owner`'s request. Its actors are released immediately and
    /// the outcome is discarded when it arrives. Returns whether a request
    /// was found.
    pub fn abandon(&mut self, owner: ActorId) -> bool {
        let Some(&ticket) = self.in_flight.get(&owner) else {
            return false;
        };
        self.in_flight.retain(|_, t| *t != ticket);
        self.abandoned.insert(ticket);
        info!(owner = %owner, ticket, "Creation abandoned");
        true
    }

    /// Collect every outcome that is already available.
    pub fn drain(&mut self) -> Vec<Completed> {
        let mut out = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            if let Some(completed) = self.accept(outcome) {
                out.push(completed);
            }
        }
        out
    }

    /// Wait for the next outcome. `None` once nothing is pending.
    pub async fn next_completed(&mut self) -> Option<Completed> {
        while self.pending > 0 {
            let outcome = self.rx.recv().await?;
            if let Some(completed) = self.accept(outcome) {
                return Some(completed);
            }
        }
        None
    }

    fn accept(&mut self, outcome: Outcome) -> Option<Completed> {
        self.pending = self.pending.saturating_sub(1);
        if self.abandoned.remove(&outcome.ticket) {
            debug!(ticket = outcome.ticket, "Discarding abandoned creation");
            return None;
        }
        self.in_flight.retain(|_, t| *t != outcome.ticket);
        Some(outcome.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::NoopPainter;

    struct Failing;

    impl TerrainPainter for Failing {
        fn paint(&self, center: ColumnPos) -> std::result::Result<(), TerrainError> {
            Err(TerrainError::Occupied(center))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Panicking;

    impl TerrainPainter for Panicking {
        fn paint(&self, _center: ColumnPos) -> std::result::Result<(), TerrainError> {
            panic!("painter exploded")
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    const ORIGIN: ColumnPos = ColumnPos { x: 0, z: 0 };

    #[tokio::test]
    async fn completes_with_the_submitted_center() {
        let mut p = CreationPipeline::new(Arc::new(NoopPainter));
        let owner = ActorId::new();
        p.submit(TerritoryDraft::solo(owner, "Keep"), ColumnPos::new(0, -1000))
            .expect("submit");
        assert!(p.is_in_flight(owner));

        let done = p.next_completed().await.expect("completed");
        assert_eq!(done.center, ColumnPos::new(0, -1000));
        assert!(done.painted.is_ok());
        assert!(!p.is_in_flight(owner));
        assert!(p.next_completed().await.is_none());
    }

    #[tokio::test]
    async fn second_request_for_any_draft_actor_is_rejected() {
        let mut p = CreationPipeline::new(Arc::new(NoopPainter));
        let owner = ActorId::new();
        let friend = ActorId::new();
        p.submit(TerritoryDraft::solo(owner, "A").with_members([friend]), ORIGIN)
            .expect("submit");
        assert_eq!(p.busy_actor(&TerritoryDraft::solo(friend, "B")), Some(friend));
        let err = p
            .submit(TerritoryDraft::solo(friend, "B"), ORIGIN)
            .expect_err("friend is busy");
        assert!(matches!(err, HostError::CreationInProgress(a) if a == friend));
        p.next_completed().await.expect("completed");
        p.submit(TerritoryDraft::solo(friend, "B"), ORIGIN)
            .expect("free again");
    }

    #[tokio::test]
    async fn abandoned_requests_are_discarded() {
        let mut p = CreationPipeline::new(Arc::new(NoopPainter));
        let owner = ActorId::new();
        p.submit(TerritoryDraft::solo(owner, "Gone"), ORIGIN).expect("submit");
        assert!(p.abandon(owner));
        assert!(!p.abandon(owner));
        assert!(!p.is_in_flight(owner));
        assert!(p.next_completed().await.is_none());
        assert_eq!(p.pending(), 0);
    }

    #[tokio::test]
    async fn paint_failures_are_reported() {
        let mut p = CreationPipeline::new(Arc::new(Failing));
        p.submit(TerritoryDraft::solo(ActorId::new(), "Rock"), ORIGIN)
            .expect("submit");
        let done = p.next_completed().await.expect("completed");
        assert!(matches!(done.painted, Err(TerrainError::Occupied(_))));
    }

    #[tokio::test]
    async fn panicking_painter_releases_actors() {
        let mut p = CreationPipeline::new(Arc::new(Panicking));
        let owner = ActorId::new();
        p.submit(TerritoryDraft::solo(owner, "Boom"), ColumnPos::new(1000, -1000))
            .expect("submit");
        let done = p.next_completed().await.expect("completed");
        assert!(done.painted.is_err());
        assert_eq!(done.draft.owner, owner);
        assert_eq!(done.center, ColumnPos::new(1000, -1000));
        assert!(!p.is_in_flight(owner));
    }

    #[tokio::test]
    async fn drain_collects_finished_jobs() {
        let mut p = CreationPipeline::new(Arc::new(NoopPainter));
        for x in 0..3 {
            p.submit(TerritoryDraft::solo(ActorId::new(), "t"), ColumnPos::new(x * 1000, 0))
                .expect("submit");
        }
        let mut seen = Vec::new();
        while seen.len() < 3 {
            tokio::task::yield_now().await;
            seen.extend(p.drain());
        }
        let mut centers: Vec<_> = seen.iter().map(|c| c.center).collect();
        centers.sort_by_key(|c| (c.x, c.z));
        centers.dedup();
        assert_eq!(centers.len(), 3);
        assert_eq!(p.pending(), 0);
    }
}
