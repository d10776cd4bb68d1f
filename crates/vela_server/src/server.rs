//! # Game Server Core
//!
//! One tick, in order:
//!
//! ```text
//! inbound commands ──▶ validate + apply   (rejection logged, tick unaffected)
//!        │
//!        ▼
//! Simulation::step(dt)                    (fixed dt, systems in order)
//!        │
//!        ▼
//! InterestManager                         (entity + player cell updates)
//!        │
//!        ▼
//! per connection: filter ▶ snapshot ▶ delta ▶ send
//!        │
//!        ▼
//! EntityCache::put(deferred)              (flushed on its own interval)
//! ```
//!
//! Everything is constructed explicitly at startup and handed in; the
//! server owns no global state.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;
use vela_core::{
    Building, BuildingKind, Component, ComponentKind, Corporation, Economy, EntityId, Fleet,
    Formation, Position, Rotation, ShieldArc, Sovereignty, Velocity,
};
use vela_net::{world_snapshot, ConnectionChannel, InterestManager};
use vela_persist::{EntityCache, EntityRecord};
use vela_sim::{Command, CommandError, Simulation};

/// One command waiting for the next tick.
#[derive(Clone, Debug)]
pub struct QueuedCommand {
    /// Connection that submitted it.
    pub player: EntityId,
    /// Client-assigned sequence number, echoed back in the verdict.
    pub sequence: u64,
    /// The command itself.
    pub command: Command,
}

/// Outcome of one queued command, for the transport to relay.
#[derive(Debug)]
pub struct CommandVerdict {
    /// Connection that submitted the command.
    pub player: EntityId,
    /// Client-assigned sequence number.
    pub sequence: u64,
    /// Accepted, or the rejection reason.
    pub result: Result<(), CommandError>,
}

/// Server-level counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerMetrics {
    /// Commands validated and applied.
    pub commands_applied: u64,
    /// Commands rejected at validation.
    pub commands_rejected: u64,
    /// Connections dropped after their transport closed.
    pub connections_dropped: u64,
}

/// The authoritative world process, minus the tick timer.
pub struct GameServer {
    sim: Simulation,
    interest: InterestManager,
    cache: Arc<EntityCache>,
    connections: HashMap<EntityId, ConnectionChannel>,
    inbox: Vec<QueuedCommand>,
    metrics: ServerMetrics,
}

impl GameServer {
    /// Builds a server over an empty world.
    #[must_use]
    pub fn new(cell_size: f64, cache: Arc<EntityCache>) -> Self {
        Self {
            sim: Simulation::new(),
            interest: InterestManager::new(cell_size),
            cache,
            connections: HashMap::new(),
            inbox: Vec::new(),
            metrics: ServerMetrics::default(),
        }
    }

    /// Registers a connection for `player`; their snapshots flow through
    /// `outbound`. The first packet they receive is a full snapshot.
    pub fn add_connection(&mut self, player: EntityId, outbound: Sender<Vec<u8>>) {
        tracing::info!(%player, "connection registered");
        self.connections
            .insert(player, ConnectionChannel::new(outbound));
    }

    /// Unregisters a connection and forgets its interest state. The
    /// player's entity stays in the world.
    pub fn remove_connection(&mut self, player: EntityId) {
        self.connections.remove(&player);
        self.interest.remove_player(player);
        tracing::info!(%player, "connection removed");
    }

    /// Queues a command for the next tick.
    pub fn queue_command(&mut self, player: EntityId, sequence: u64, command: Command) {
        self.inbox.push(QueuedCommand {
            player,
            sequence,
            command,
        });
    }

    /// Runs one full tick and returns each queued command's verdict.
    ///
    /// `timestamp_ms` is stamped onto outgoing snapshots so clients can
    /// schedule interpolation; the simulation itself never reads it.
    pub fn tick(&mut self, dt: f64, timestamp_ms: f64) -> Vec<CommandVerdict> {
        let verdicts = self.apply_inbox();
        self.sim.step(dt);
        self.update_interest();
        self.broadcast_snapshots(timestamp_ms);
        self.enqueue_persistence();

        for event in self.sim.drain_events() {
            tracing::debug!(?event, tick = self.sim.tick(), "simulation event");
        }
        verdicts
    }

    fn apply_inbox(&mut self) -> Vec<CommandVerdict> {
        let queued = std::mem::take(&mut self.inbox);
        queued
            .into_iter()
            .map(|q| {
                let result = self.sim.apply(&q.command);
                match &result {
                    Ok(()) => self.metrics.commands_applied += 1,
                    Err(reason) => {
                        self.metrics.commands_rejected += 1;
                        tracing::warn!(player = %q.player, sequence = q.sequence, %reason, "command rejected");
                    }
                }
                CommandVerdict {
                    player: q.player,
                    sequence: q.sequence,
                    result,
                }
            })
            .collect()
    }

    fn update_interest(&mut self) {
        let positioned = self.sim.world_mut().entities_with(&[ComponentKind::Position]);
        for entity in positioned {
            if let Some(pos) = self.sim.world().position(entity).copied() {
                self.interest.update_entity(entity, pos);
            }
        }
        for player in self.connections.keys().copied().collect::<Vec<_>>() {
            if let Some(pos) = self.sim.world().position(player).copied() {
                self.interest.update_player(player, pos);
            }
        }
        for destroyed in self.sim.world_mut().drain_destroyed() {
            self.interest.remove_entity(destroyed);
            if let Err(error) = self.cache.remove(destroyed, false) {
                tracing::error!(entity = %destroyed, %error, "failed to queue durable delete");
            }
        }
        self.sim.world_mut().drain_created();
    }

    fn broadcast_snapshots(&mut self, timestamp_ms: f64) {
        let all: Vec<EntityId> = self.sim.world().entities().collect();
        let tick = self.sim.tick();

        let mut stale = Vec::new();
        for (player, channel) in &self.connections {
            let visible = self.interest.filter_for_player(*player, &all);
            let snapshot = world_snapshot(self.sim.world(), &visible);
            if !channel.send_snapshot(tick, timestamp_ms, snapshot) {
                stale.push(*player);
            }
        }
        for player in stale {
            self.metrics.connections_dropped += 1;
            self.remove_connection(player);
        }
    }

    fn enqueue_persistence(&mut self) {
        let entities: Vec<EntityId> = self.sim.world().entities().collect();
        for entity in entities {
            let record = EntityRecord::new(entity, self.sim.world().components_of(entity));
            if let Err(error) = self.cache.put(record, false) {
                tracing::error!(%entity, %error, "failed to queue durable write");
            }
        }
    }

    /// Seeds a small playable sector: a corporation, two producing bases
    /// under its sovereignty, and a three-ship fleet.
    ///
    /// Returns the fleet leader, a convenient entity to attach a demo
    /// connection to.
    pub fn seed_demo_sector(&mut self) -> EntityId {
        let world = self.sim.world_mut();

        let corp = world.create_entity();
        world.add_component(
            corp,
            Component::Corporation(Corporation { treasury: 10_000.0 }),
        );

        for (x, kind) in [(200.0, BuildingKind::Mine), (450.0, BuildingKind::Generator)] {
            let base = world.create_entity();
            world.add_component(base, Component::Position(Position::new(x, 0.0, 100.0)));
            world.add_component(
                base,
                Component::Economy(Economy::with_stock(1_000.0, 1_000.0, 500.0)),
            );
            world.add_component(
                base,
                Component::Building(Building {
                    kind,
                    level: 2,
                    active: true,
                }),
            );
            world.add_component(
                base,
                Component::Sovereignty(Sovereignty {
                    owner: Some(corp),
                    influence: 50.0,
                    tax_rate: 0.1,
                }),
            );
        }

        let leader = world.create_entity();
        world.add_component(leader, Component::Position(Position::new(0.0, 0.0, 0.0)));
        world.add_component(leader, Component::Velocity(Velocity::default()));
        world.add_component(leader, Component::Rotation(Rotation { yaw: 0.0 }));
        world.add_component(
            leader,
            Component::ShieldArc(ShieldArc {
                strength: 100.0,
                max_strength: 100.0,
                facing: 0.0,
                arc: std::f64::consts::FRAC_PI_2,
            }),
        );

        let mut members = Vec::new();
        for i in 0..3 {
            let ship = world.create_entity();
            world.add_component(
                ship,
                Component::Position(Position::new(-10.0 * f64::from(i), 0.0, -10.0)),
            );
            world.add_component(ship, Component::Velocity(Velocity::default()));
            members.push(ship);
        }
        world.add_component(
            leader,
            Component::Fleet(Fleet {
                members,
                formation: Formation::Delta,
                jumping: false,
                jump_progress: 0.0,
                destination: None,
            }),
        );

        world.drain_created();
        tracing::info!(entities = world.len(), "demo sector seeded");
        leader
    }

    /// Read access to the simulation.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Mutable access to the simulation (setup paths).
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Read access to the interest index.
    #[must_use]
    pub fn interest(&self) -> &InterestManager {
        &self.interest
    }

    /// Server-level counters.
    #[must_use]
    pub const fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use vela_core::ResourceKind;
    use vela_net::protocol::{decode_packet, SnapshotKind};
    use vela_persist::EntityStore;

    const DT: f64 = 1.0 / 30.0;

    fn server(dir: &tempfile::TempDir) -> GameServer {
        let store = EntityStore::open(dir.path()).unwrap();
        let cache = Arc::new(EntityCache::new(store, 300_000));
        GameServer::new(1000.0, cache)
    }

    #[test]
    fn test_first_snapshot_full_then_delta() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        let leader = server.seed_demo_sector();

        let (tx, rx) = unbounded();
        server.add_connection(leader, tx);

        server.tick(DT, 0.0);
        let first = decode_packet(&rx.recv().unwrap()).unwrap();
        assert_eq!(first.kind, SnapshotKind::Full);
        // The leader sees itself in the full snapshot.
        assert!(first.payload.get(&leader.raw().to_string()).is_some());

        // Fleet members keep drifting into formation, so later ticks
        // produce deltas rather than silence.
        server.tick(DT, 33.0);
        let second = decode_packet(&rx.recv().unwrap()).unwrap();
        assert_eq!(second.kind, SnapshotKind::Delta);
    }

    #[test]
    fn test_rejected_command_does_not_abort_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        let leader = server.seed_demo_sector();

        server.queue_command(
            leader,
            7,
            Command::TransferResources {
                from: EntityId(9999),
                to: leader,
                resource: ResourceKind::Metal,
                amount: 10.0,
            },
        );
        let verdicts = server.tick(DT, 0.0);

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].sequence, 7);
        assert!(verdicts[0].result.is_err());
        assert_eq!(server.metrics().commands_rejected, 1);
        assert_eq!(server.simulation().tick(), 1);
    }

    #[test]
    fn test_accepted_move_command_starts_jump() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        let leader = server.seed_demo_sector();

        server.queue_command(
            leader,
            1,
            Command::MoveFleet {
                fleet: leader,
                destination: Position::new(500.0, 0.0, 500.0),
            },
        );
        let verdicts = server.tick(DT, 0.0);

        assert!(verdicts[0].result.is_ok());
        let fleet = server.simulation().world().fleet(leader).unwrap();
        assert!(fleet.jumping);
    }

    #[test]
    fn test_tick_queues_world_for_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        server.seed_demo_sector();

        server.tick(DT, 0.0);
        let live = server.simulation().world().len();
        assert_eq!(server.cache.pending_writes(), live);

        assert_eq!(server.cache.flush().unwrap(), live);
        assert_eq!(server.cache.pending_writes(), 0);
    }

    #[test]
    fn test_closed_transport_drops_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        let leader = server.seed_demo_sector();

        let (tx, rx) = unbounded();
        server.add_connection(leader, tx);
        drop(rx);

        server.tick(DT, 0.0);
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.metrics().connections_dropped, 1);
    }

    #[test]
    fn test_interest_hides_far_entities() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(&dir);
        let leader = server.seed_demo_sector();

        let far = {
            let world = server.simulation_mut().world_mut();
            let far = world.create_entity();
            world.add_component(far, Component::Position(Position::new(50_000.0, 0.0, 0.0)));
            far
        };

        let (tx, rx) = unbounded();
        server.add_connection(leader, tx);
        server.tick(DT, 0.0);

        let packet = decode_packet(&rx.recv().unwrap()).unwrap();
        assert!(packet.payload.get(&far.raw().to_string()).is_none());
        assert!(packet.payload.get(&leader.raw().to_string()).is_some());
    }
}
