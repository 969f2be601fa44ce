//! Collaborator boundary to the host world and the stance store.
//!
//! The crate never owns actors, proxies, or chunks; it reaches them through
//! [`WorldAccess`]. Reads are served wherever the caller is; writes must
//! only be performed from the owning region thread, which is why every
//! write in this crate is wrapped in a
//! [`RegionScheduler::run_on_owner`](crate::scheduler::RegionScheduler::run_on_owner)
//! action that re-checks liveness at execution time.

use dashmap::DashMap;

use crate::error::WorldError;
use crate::gear::GearSet;
use crate::types::{ActorId, Position, ProxyId};

/// Host-world operations consumed by the transient-effect services.
pub trait WorldAccess: Send + Sync + std::fmt::Debug {
    /// Whether the actor is still live (spawned and online).
    fn is_live(&self, actor: ActorId) -> bool;

    /// Current location of a live actor, `None` once it despawned.
    fn location_of(&self, actor: ActorId) -> Option<Position>;

    /// Read the actor's currently applied gear. `None` if the actor is gone.
    fn gear_of(&self, actor: ActorId) -> Option<GearSet>;

    /// Overwrite the actor's applied gear.
    ///
    /// Must only be called from the actor's owning region thread; the
    /// services guarantee this by dispatching through the scheduler.
    fn set_gear(&self, actor: ActorId, gear: GearSet);

    /// Current location of a proxy object, `None` once it is gone.
    fn proxy_location(&self, proxy: ProxyId) -> Option<Position>;

    /// Destroy a proxy object. A proxy that already despawned is a silent
    /// no-op, not an error; `Err` is reserved for genuine host failures.
    fn despawn_proxy(&self, proxy: ProxyId) -> Result<(), WorldError>;

    /// Asynchronously move an actor to a location (fire-and-forget).
    fn relocate(&self, actor: ActorId, to: Position);

    /// Asynchronously release a world chunk that was preloaded for a
    /// location (fire-and-forget).
    fn release_chunk(&self, at: Position);
}

/// A per-actor snapshot of active passive-state that must survive a region
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stance(String);

impl Stance {
    /// Create a stance from its host-side name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The host-side name of this stance.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Save/restore store for per-actor stances.
pub trait StanceStore: Send + Sync + std::fmt::Debug {
    /// Current stance of the actor, if any.
    fn stance_of(&self, actor: ActorId) -> Option<Stance>;

    /// Replace the actor's stance.
    fn set_stance(&self, actor: ActorId, stance: Stance);

    /// Drop the actor's stance entirely.
    fn clear_stance(&self, actor: ActorId);
}

/// Simple in-memory stance store for single-process hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryStanceStore {
    stances: DashMap<ActorId, Stance>,
}

impl MemoryStanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StanceStore for MemoryStanceStore {
    fn stance_of(&self, actor: ActorId) -> Option<Stance> {
        self.stances.get(&actor).map(|s| s.clone())
    }

    fn set_stance(&self, actor: ActorId, stance: Stance) {
        self.stances.insert(actor, stance);
    }

    fn clear_stance(&self, actor: ActorId) {
        self.stances.remove(&actor);
    }
}
