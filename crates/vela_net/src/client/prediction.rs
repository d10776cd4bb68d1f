//! # Prediction Engine
//!
//! Applies local intents immediately instead of waiting a round trip:
//!
//! 1. capture the touched entities' relevant components (for rollback)
//! 2. speculatively apply the same mutation the server will apply
//! 3. track the command and hand it to the transport
//!
//! Confirmation settles the command and feeds the rolling latency
//! estimate. Rejection restores the captured state. An authoritative
//! snapshot reconciles drift, then re-applies still-pending commands on
//! the corrected baseline. Expired commands are abandoned: dropped from
//! tracking with their speculative effects left in place for the next
//! snapshot to sort out.

use std::collections::HashMap;

use crossbeam_channel::Sender;
use vela_core::{Component, ComponentKind, EntityId, WorldStore};
use vela_sim::{apply_command, Command, CommandError};

use crate::client::command::CommandBuffer;
use crate::client::reconcile::StateReconciler;
use crate::protocol::Value;

/// Captured pre-command state: `None` means the component was absent.
type SavedState = Vec<(EntityId, ComponentKind, Option<Component>)>;

/// Client-side speculative command application.
pub struct PredictionEngine {
    buffer: CommandBuffer,
    reconciler: StateReconciler,
    outbound: Sender<(u64, Command)>,
    saved: HashMap<u64, SavedState>,
    next_id: u64,
    /// Rolling confirm round-trip estimate, milliseconds.
    latency_ms: f64,
}

impl PredictionEngine {
    /// Creates an engine sending commands over `outbound`.
    #[must_use]
    pub fn new(
        buffer: CommandBuffer,
        reconciler: StateReconciler,
        outbound: Sender<(u64, Command)>,
    ) -> Self {
        Self {
            buffer,
            reconciler,
            outbound,
            saved: HashMap::new(),
            next_id: 0,
            latency_ms: 0.0,
        }
    }

    /// Predicts one intent: captures rollback state, applies the
    /// mutation locally, tracks it and hands it to the transport.
    ///
    /// # Errors
    ///
    /// Validation failure returns the error with the world untouched and
    /// nothing tracked or sent.
    pub fn predict(
        &mut self,
        world: &mut WorldStore,
        command: Command,
        now_ms: f64,
    ) -> Result<u64, CommandError> {
        let saved = capture_state(world, &command);
        apply_command(world, &command)?;

        let id = self.next_id;
        self.next_id += 1;

        for abandoned in self.buffer.add(id, command.clone(), now_ms) {
            self.saved.remove(&abandoned);
        }
        self.saved.insert(id, saved);

        if self.outbound.send((id, command)).is_err() {
            tracing::warn!(id, "command transport closed");
        }
        Ok(id)
    }

    /// Marks a command confirmed and folds its round trip into the
    /// latency estimate. Returns false for unknown or settled ids.
    pub fn confirm(&mut self, id: u64, now_ms: f64) -> bool {
        let Some(entry) = self.buffer.confirm(id) else {
            return false;
        };
        let round_trip = now_ms - entry.issued_at_ms;
        self.latency_ms = self.latency_ms * 0.9 + round_trip * 0.1;
        self.saved.remove(&id);
        true
    }

    /// Rolls back a rejected command to its captured pre-state.
    pub fn reject(&mut self, world: &mut WorldStore, id: u64) -> bool {
        if self.buffer.reject(id).is_none() {
            return false;
        }
        if let Some(saved) = self.saved.remove(&id) {
            restore_state(world, saved);
        }
        true
    }

    /// Reconciles against an authoritative snapshot, applies the
    /// corrections, then re-applies still-pending commands on the
    /// corrected baseline.
    pub fn on_authoritative_snapshot(
        &mut self,
        world: &mut WorldStore,
        authority: &Value,
        now_ms: f64,
    ) {
        let corrections = self.reconciler.reconcile(world, authority);
        self.reconciler.apply(world, &corrections, now_ms);

        let pending: Vec<(u64, Command)> = self
            .buffer
            .pending()
            .map(|(id, entry)| (id, entry.command.clone()))
            .collect();
        for (id, command) in pending {
            if let Err(error) = apply_command(world, &command) {
                tracing::debug!(id, %error, "pending command no longer applies");
            }
        }
    }

    /// Per-frame upkeep: advances eased corrections and abandons
    /// expired commands.
    pub fn update(&mut self, world: &mut WorldStore, now_ms: f64) {
        self.reconciler.update(world, now_ms);
        for abandoned in self.buffer.purge_expired(now_ms) {
            self.saved.remove(&abandoned);
        }
    }

    /// Rolling confirm latency estimate, milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Commands awaiting a verdict.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.pending_len()
    }

    /// The reconciler, for stats inspection.
    #[must_use]
    pub const fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }
}

/// Captures the components a command may touch, present or not.
fn capture_state(world: &WorldStore, command: &Command) -> SavedState {
    let targets: Vec<(EntityId, ComponentKind)> = match *command {
        Command::MoveFleet { fleet, .. } => vec![
            (fleet, ComponentKind::Fleet),
            (fleet, ComponentKind::Position),
        ],
        Command::BuildBuilding { site, .. } => vec![
            (site, ComponentKind::Economy),
            (site, ComponentKind::Building),
        ],
        Command::TransferResources { from, .. } => vec![
            (from, ComponentKind::Economy),
            (from, ComponentKind::Logistics),
        ],
    };
    targets
        .into_iter()
        .map(|(entity, kind)| (entity, kind, world.get(entity, kind).cloned()))
        .collect()
}

fn restore_state(world: &mut WorldStore, saved: SavedState) {
    for (entity, kind, component) in saved {
        match component {
            Some(component) => world.add_component(entity, component),
            None => {
                world.remove_component(entity, kind);
            }
        }
    }
}
