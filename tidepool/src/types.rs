//! Core identity and location types.
//!
//! This module provides the fundamental types shared by every service in the
//! crate:
//! - [`ActorId`], [`EffectId`], [`ProxyId`]: opaque handles to host-owned
//!   objects. The crate never owns the objects behind them; it only keeps
//!   keyed associations.
//! - [`RegionId`]: the ownership token for a spatial partition of the world.
//! - [`Position`]: integer world coordinates, resolved to a region owner by
//!   the scheduler.

use serde::{Deserialize, Serialize};

/// Handle to a live actor owned by the host world.
///
/// The crate stores `ActorId`s, never actor objects. Liveness is always
/// re-checked through [`WorldAccess`](crate::world::WorldAccess) at the
/// moment a mutation executes, because an actor can despawn between
/// scheduling and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

/// Handle to an effect (an ability-style lifecycle object) owned by the host.
///
/// Used as the secondary index key in the proxy registry and to identify the
/// owning effect of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub u64);

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "effect:{}", self.0)
    }
}

/// Handle to a short-lived world-object proxy (falling-block style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyId(pub u64);

impl std::fmt::Display for ProxyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proxy:{}", self.0)
    }
}

/// Ownership token for a region of the world.
///
/// Exactly one worker thread owns a region at a time. Two positions are in
/// the same region iff their tokens compare equal. The token is opaque:
/// only the [`RegionScheduler`](crate::scheduler::RegionScheduler) knows how
/// positions map to regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u64);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region:{:016x}", self.0)
    }
}

/// Integer world coordinates.
///
/// A `Position` carries no region information of its own; ask the scheduler
/// for the owner. Region partitioning only looks at `x` and `z` (the world
/// is partitioned in columns), but `y` is kept so dispatched actions can
/// reconstruct the full location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl Position {
    /// Create a position from coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
