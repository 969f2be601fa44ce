//! Region-affinity dispatch: run a mutation on the thread that owns a
//! location.
//!
//! The world is partitioned into regions, each processed by exactly one
//! worker thread at a time. Every entity-touching write in this crate is
//! funneled through [`RegionScheduler::run_on_owner`]; nothing else mutates
//! an actor or proxy directly.
//!
//! # Contract
//!
//! - If the calling thread already owns the region containing the position,
//!   the action runs synchronously, before `run_on_owner` returns.
//! - Otherwise the action is handed off to the owning thread and runs
//!   asynchronously at an unspecified later time.
//! - An action executes at most once and is never silently dropped.
//! - Actions submitted by one caller for the same target actor execute in
//!   submission order. No ordering is promised across different actors or
//!   different callers.
//! - The target may become invalid before the action runs; the action still
//!   runs and must check liveness itself.

use crate::types::{Position, RegionId};

/// A deferred mutation handed to the owning region thread.
pub type OwnerAction = Box<dyn FnOnce() + Send + 'static>;

/// Dispatch seam between this crate and the host's region threading.
///
/// Implementations wrap whatever thread-ownership machinery the host world
/// provides. [`SimScheduler`](crate::sim::SimScheduler) is the in-crate
/// deterministic implementation used by tests and simulations.
pub trait RegionScheduler: Send + Sync + std::fmt::Debug {
    /// Resolve the ownership token for the region containing `position`.
    ///
    /// Two positions are in the same region iff their tokens are equal.
    /// Ownership can change over time; a token is a snapshot, and races
    /// between observation and a later dispatch are accepted — the action
    /// runs wherever the target is owned at dispatch time.
    fn owner_of(&self, position: Position) -> RegionId;

    /// Whether the calling thread currently owns the region containing
    /// `position`.
    fn is_owned_by_caller(&self, position: Position) -> bool;

    /// Execute `action` on the thread owning `position`, per the module
    /// contract: synchronous local fast-path, asynchronous hand-off
    /// otherwise, at-most-once, never dropped.
    fn run_on_owner(&self, position: Position, action: OwnerAction);
}
