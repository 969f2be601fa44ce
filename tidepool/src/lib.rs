//! # Tidepool
//!
//! Transient world-effect management for region-threaded simulated worlds.
//!
//! The host world is partitioned into regions, each owned by exactly one
//! worker thread at a time. Effects running on one thread routinely need to
//! touch actors and objects owned by another; tidepool provides the
//! bookkeeping that makes those transient touches safe and reversible:
//!
//! - [`GearOverlays`] — per-actor stacks of temporary gear overlays,
//!   ordered by nearest absolute deadline, with baseline capture/restore.
//! - [`ProxyRegistry`] — expiry-tracked registry of ephemeral world-object
//!   proxies, indexed by owning effect, swept on two TTL tiers.
//! - [`RegionMonitor`] — per-actor region-crossing detection with a
//!   vetoable migration notice and stance re-homing.
//! - [`RegionScheduler`] — the dispatch seam every entity-touching write
//!   goes through: synchronous on the owning thread, handed off otherwise.
//!
//! The crate owns no world state. Hosts implement [`WorldAccess`],
//! [`StanceStore`], and [`RegionScheduler`] against their engine;
//! [`sim::SimWorld`] and [`sim::SimScheduler`] are deterministic in-process
//! implementations for tests and simulations.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidepool::{Tidepool, TidepoolConfig, TokioTimeProvider};
//!
//! let pool = Tidepool::new(scheduler, world, stances, Arc::new(TokioTimeProvider::new()), TidepoolConfig::default());
//! let sweeper = pool.spawn_sweeper();
//! // ... effects create overlays and register proxies ...
//! sweeper.abort();
//! pool.shutdown();
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod effect;
pub mod error;
pub mod gear;
pub mod migration;
pub mod overlay;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod sim;
pub mod sweeper;
pub mod time;
pub mod types;
pub mod world;

pub use config::TidepoolConfig;
pub use effect::{Effect, LatchEffect, SharedEffect};
pub use error::{OverlayError, RegistryError, WorldError};
pub use gear::{GearPiece, GearSet, GEAR_SLOTS};
pub use migration::{
    CheckOutcome, MigrationBus, MigrationNotice, RegionMonitor, Verdict,
};
pub use overlay::{GearOverlays, Overlay, OverlayId};
pub use registry::ProxyRegistry;
pub use scheduler::{OwnerAction, RegionScheduler};
pub use service::Tidepool;
pub use sweeper::Sweeper;
pub use time::{ManualTimeProvider, TimeProvider, TokioTimeProvider};
pub use types::{ActorId, EffectId, Position, ProxyId, RegionId};
pub use world::{MemoryStanceStore, Stance, StanceStore, WorldAccess};
