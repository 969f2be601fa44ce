//! Deterministic in-process doubles for the collaborator seams.
//!
//! Simulation counterparts to the host-provided scheduler and world:
//! [`SimScheduler`] queues cross-region actions per region and only runs
//! them when a test drains them, and [`SimWorld`] keeps scriptable actors
//! and proxies in memory while recording the fire-and-forget calls
//! (`relocate`, `release_chunk`) so tests can assert on them.
//!
//! Together with [`ManualTimeProvider`](crate::time::ManualTimeProvider)
//! these make every timing and hand-off decision in the crate observable
//! and reproducible.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::WorldError;
use crate::gear::GearSet;
use crate::scheduler::{OwnerAction, RegionScheduler};
use crate::types::{ActorId, Position, ProxyId, RegionId};
use crate::world::WorldAccess;

/// Deterministic region scheduler with explicit queue draining.
///
/// The world is partitioned into square columns of `region_span` blocks on
/// the x/z plane; each column is one region. The "calling thread" is
/// modeled explicitly: tests pick which region they are pretending to run
/// on with [`set_caller_region`](SimScheduler::set_caller_region), and
/// hand-offs sit in per-region FIFO queues until
/// [`drain`](SimScheduler::drain) or [`drain_all`](SimScheduler::drain_all)
/// runs them. FIFO queues preserve per-caller submission order, satisfying
/// the per-actor ordering contract.
pub struct SimScheduler {
    region_span: i32,
    caller: Mutex<Option<RegionId>>,
    queues: Mutex<HashMap<RegionId, VecDeque<OwnerAction>>>,
}

impl std::fmt::Debug for SimScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimScheduler")
            .field("region_span", &self.region_span)
            .field("caller", &*self.caller.lock())
            .field("pending", &self.pending_total())
            .finish()
    }
}

impl SimScheduler {
    /// Default edge length of a region column, in blocks.
    pub const DEFAULT_REGION_SPAN: i32 = 256;

    /// Create a scheduler with the default region span and no caller region.
    pub fn new() -> Self {
        Self::with_region_span(Self::DEFAULT_REGION_SPAN)
    }

    /// Create a scheduler partitioning the world into `region_span`-sized
    /// columns.
    pub fn with_region_span(region_span: i32) -> Self {
        Self {
            region_span,
            caller: Mutex::new(None),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Pretend the current thread is the worker for `region` (`None` models
    /// a thread owning no region at all).
    pub fn set_caller_region(&self, region: Option<RegionId>) {
        *self.caller.lock() = region;
    }

    /// Number of actions queued for `region`.
    pub fn pending(&self, region: RegionId) -> usize {
        self.queues
            .lock()
            .get(&region)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Number of actions queued across all regions.
    pub fn pending_total(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Run every queued action for `region`, in submission order, as that
    /// region's worker. Returns the number of actions executed. Actions may
    /// enqueue further actions; those run too if they target this region.
    pub fn drain(&self, region: RegionId) -> usize {
        let previous = *self.caller.lock();
        *self.caller.lock() = Some(region);

        let mut executed = 0;
        loop {
            // Re-lock per action so executed actions can enqueue more.
            let next = self
                .queues
                .lock()
                .get_mut(&region)
                .and_then(VecDeque::pop_front);
            match next {
                Some(action) => {
                    action();
                    executed += 1;
                }
                None => break,
            }
        }

        *self.caller.lock() = previous;
        executed
    }

    /// Drain every region until no queues hold work. Returns the total
    /// number of actions executed.
    pub fn drain_all(&self) -> usize {
        let mut executed = 0;
        loop {
            let regions: Vec<RegionId> = self.queues.lock().keys().copied().collect();
            let before = executed;
            for region in regions {
                executed += self.drain(region);
            }
            if executed == before {
                return executed;
            }
        }
    }
}

impl Default for SimScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionScheduler for SimScheduler {
    fn owner_of(&self, position: Position) -> RegionId {
        let rx = position.x.div_euclid(self.region_span);
        let rz = position.z.div_euclid(self.region_span);
        RegionId(((rx as u32 as u64) << 32) | rz as u32 as u64)
    }

    fn is_owned_by_caller(&self, position: Position) -> bool {
        *self.caller.lock() == Some(self.owner_of(position))
    }

    fn run_on_owner(&self, position: Position, action: OwnerAction) {
        if self.is_owned_by_caller(position) {
            action();
            return;
        }
        let region = self.owner_of(position);
        self.queues
            .lock()
            .entry(region)
            .or_default()
            .push_back(action);
    }
}

#[derive(Debug, Clone)]
struct SimActor {
    location: Position,
    gear: GearSet,
}

#[derive(Debug, Clone, Copy)]
struct SimProxy {
    location: Position,
}

/// Scriptable in-memory world.
///
/// Actors and proxies exist exactly while their entries do; despawning
/// removes the entry, after which reads return `None` and writes are silent
/// no-ops, matching how a real host behaves towards stale handles.
#[derive(Debug, Default)]
pub struct SimWorld {
    actors: DashMap<ActorId, SimActor>,
    proxies: DashMap<ProxyId, SimProxy>,
    relocations: Mutex<Vec<(ActorId, Position)>>,
    released_chunks: Mutex<Vec<Position>>,
}

impl SimWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn (or respawn) an actor at a location wearing `gear`.
    pub fn spawn_actor(&self, actor: ActorId, location: Position, gear: GearSet) {
        self.actors.insert(actor, SimActor { location, gear });
    }

    /// Remove an actor entirely (offline/despawned).
    pub fn despawn_actor(&self, actor: ActorId) {
        self.actors.remove(&actor);
    }

    /// Teleport an actor; silent no-op if it despawned.
    pub fn move_actor(&self, actor: ActorId, to: Position) {
        if let Some(mut entry) = self.actors.get_mut(&actor) {
            entry.location = to;
        }
    }

    /// Spawn a proxy object at a location.
    pub fn spawn_proxy(&self, proxy: ProxyId, location: Position) {
        self.proxies.insert(proxy, SimProxy { location });
    }

    /// Whether a proxy still exists in the world.
    pub fn proxy_alive(&self, proxy: ProxyId) -> bool {
        self.proxies.contains_key(&proxy)
    }

    /// Every `relocate` call observed so far, in call order.
    pub fn relocations(&self) -> Vec<(ActorId, Position)> {
        self.relocations.lock().clone()
    }

    /// Every `release_chunk` call observed so far, in call order.
    pub fn released_chunks(&self) -> Vec<Position> {
        self.released_chunks.lock().clone()
    }
}

impl WorldAccess for SimWorld {
    fn is_live(&self, actor: ActorId) -> bool {
        self.actors.contains_key(&actor)
    }

    fn location_of(&self, actor: ActorId) -> Option<Position> {
        self.actors.get(&actor).map(|a| a.location)
    }

    fn gear_of(&self, actor: ActorId) -> Option<GearSet> {
        self.actors.get(&actor).map(|a| a.gear)
    }

    fn set_gear(&self, actor: ActorId, gear: GearSet) {
        if let Some(mut entry) = self.actors.get_mut(&actor) {
            entry.gear = gear;
        }
    }

    fn proxy_location(&self, proxy: ProxyId) -> Option<Position> {
        self.proxies.get(&proxy).map(|p| p.location)
    }

    fn despawn_proxy(&self, proxy: ProxyId) -> Result<(), WorldError> {
        // Already-gone proxies are a no-op, not an error.
        self.proxies.remove(&proxy);
        Ok(())
    }

    fn relocate(&self, actor: ActorId, to: Position) {
        self.relocations.lock().push((actor, to));
        self.move_actor(actor, to);
    }

    fn release_chunk(&self, at: Position) {
        self.released_chunks.lock().push(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pos(x: i32, z: i32) -> Position {
        Position::new(x, 64, z)
    }

    #[test]
    fn test_owner_tokens_partition_the_plane() {
        let scheduler = SimScheduler::with_region_span(256);

        assert_eq!(scheduler.owner_of(pos(0, 0)), scheduler.owner_of(pos(255, 255)));
        assert_ne!(scheduler.owner_of(pos(0, 0)), scheduler.owner_of(pos(256, 0)));
        // Negative coordinates land in their own region, not region zero.
        assert_ne!(scheduler.owner_of(pos(-1, 0)), scheduler.owner_of(pos(0, 0)));
    }

    #[test]
    fn test_local_fast_path_runs_synchronously() {
        let scheduler = SimScheduler::new();
        let here = pos(10, 10);
        scheduler.set_caller_region(Some(scheduler.owner_of(here)));

        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        scheduler.run_on_owner(here, Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_total(), 0);
    }

    #[test]
    fn test_remote_hand_off_waits_for_drain() {
        let scheduler = SimScheduler::new();
        let there = pos(1000, 1000);
        scheduler.set_caller_region(Some(scheduler.owner_of(pos(0, 0))));

        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        scheduler.run_on_owner(there, Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(scheduler.owner_of(there)), 1);

        assert_eq!(scheduler.drain(scheduler.owner_of(there)), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hand_offs_run_in_submission_order() {
        let scheduler = SimScheduler::new();
        let there = pos(1000, 1000);
        scheduler.set_caller_region(None);

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            scheduler.run_on_owner(there, Box::new(move || {
                order.lock().push(i);
            }));
        }

        scheduler.drain_all();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_drained_action_sees_itself_as_owner() {
        let scheduler = Arc::new(SimScheduler::new());
        let there = pos(1000, 1000);
        scheduler.set_caller_region(None);

        let nested = Arc::new(AtomicUsize::new(0));
        let nested2 = Arc::clone(&nested);
        let scheduler2 = Arc::clone(&scheduler);
        scheduler.run_on_owner(there, Box::new(move || {
            // Re-dispatch to the same region from inside a drained action:
            // must hit the synchronous fast-path.
            scheduler2.run_on_owner(there, Box::new(move || {
                nested2.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        scheduler.drain(scheduler.owner_of(there));
        assert_eq!(nested.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sim_world_silent_no_ops_after_despawn() {
        let world = SimWorld::new();
        let actor = ActorId(1);
        world.spawn_actor(actor, pos(0, 0), [None; 4]);
        world.despawn_actor(actor);

        assert!(!world.is_live(actor));
        assert!(world.gear_of(actor).is_none());
        world.set_gear(actor, [Some(crate::gear::GearPiece(1)), None, None, None]);
        assert!(world.gear_of(actor).is_none());
    }

    #[test]
    fn test_sim_world_records_async_calls() {
        let world = SimWorld::new();
        let actor = ActorId(2);
        world.spawn_actor(actor, pos(0, 0), [None; 4]);

        world.relocate(actor, pos(5, 5));
        world.release_chunk(pos(0, 0));

        assert_eq!(world.relocations(), vec![(actor, pos(5, 5))]);
        assert_eq!(world.released_chunks(), vec![pos(0, 0)]);
        assert_eq!(world.location_of(actor), Some(pos(5, 5)));
    }
}
