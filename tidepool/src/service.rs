//! Top-level service bundle: construction, wiring, teardown.
//!
//! Everything in this crate is reached through an explicit [`Tidepool`]
//! value owned by the host, passed by reference to consumers. There is no
//! process-global state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::TidepoolConfig;
use crate::migration::{MigrationBus, RegionMonitor};
use crate::overlay::GearOverlays;
use crate::registry::ProxyRegistry;
use crate::scheduler::RegionScheduler;
use crate::sweeper::Sweeper;
use crate::time::TimeProvider;
use crate::types::ActorId;
use crate::world::{StanceStore, WorldAccess};

/// The transient-effect services, wired together.
#[derive(Debug)]
pub struct Tidepool {
    config: TidepoolConfig,
    scheduler: Arc<dyn RegionScheduler>,
    world: Arc<dyn WorldAccess>,
    stances: Arc<dyn StanceStore>,
    time: Arc<dyn TimeProvider>,
    overlays: Arc<GearOverlays>,
    registry: Arc<ProxyRegistry>,
    bus: Arc<MigrationBus>,
}

impl Tidepool {
    /// Wire the services against the host's collaborators.
    pub fn new(
        scheduler: Arc<dyn RegionScheduler>,
        world: Arc<dyn WorldAccess>,
        stances: Arc<dyn StanceStore>,
        time: Arc<dyn TimeProvider>,
        config: TidepoolConfig,
    ) -> Self {
        let overlays = Arc::new(GearOverlays::new(
            Arc::clone(&scheduler),
            Arc::clone(&world),
            Arc::clone(&time),
            config.default_overlay_duration,
        ));
        let registry = Arc::new(ProxyRegistry::new(
            Arc::clone(&scheduler),
            Arc::clone(&world),
            Arc::clone(&time),
            config.short_ttl,
            config.long_ttl,
        ));
        Self {
            config,
            scheduler,
            world,
            stances,
            time,
            overlays,
            registry,
            bus: Arc::new(MigrationBus::new()),
        }
    }

    /// The effective configuration.
    pub fn config(&self) -> &TidepoolConfig {
        &self.config
    }

    /// The overlay service.
    pub fn overlays(&self) -> &Arc<GearOverlays> {
        &self.overlays
    }

    /// The proxy registry.
    pub fn registry(&self) -> &Arc<ProxyRegistry> {
        &self.registry
    }

    /// The migration fan-out point, for hosts subscribing veto logic.
    pub fn migration_bus(&self) -> &Arc<MigrationBus> {
        &self.bus
    }

    /// Build a migration monitor for `actor`, wired to this bundle. The
    /// caller decides whether to drive it manually or
    /// [`spawn`](RegionMonitor::spawn) it.
    pub fn monitor(&self, actor: ActorId) -> RegionMonitor {
        RegionMonitor::new(
            actor,
            Arc::clone(&self.scheduler),
            Arc::clone(&self.world),
            Arc::clone(&self.stances),
            Arc::clone(&self.bus),
        )
    }

    /// Spawn the periodic monitor task for `actor`; it stops on its own
    /// once the actor is gone.
    pub fn spawn_monitor(&self, monitor: Arc<RegionMonitor>) -> JoinHandle<()> {
        monitor.spawn(Arc::clone(&self.time), self.config.monitor_interval)
    }

    /// Spawn the periodic sweep task at `config.sweep_interval`. Runs until
    /// aborted; hosts keep the handle and abort it at shutdown.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&self.overlays),
            Arc::clone(&self.registry),
        ));
        sweeper.spawn(Arc::clone(&self.time), self.config.sweep_interval)
    }

    /// One-shot sweeper for hosts driving the cadence themselves.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(Arc::clone(&self.overlays), Arc::clone(&self.registry))
    }

    /// Tear everything down: revert every overlay (restoring baselines) and
    /// destroy every tracked proxy. Idempotent.
    pub fn shutdown(&self) {
        let overlays = self.overlays.revert_all();
        let proxies = self.registry.remove_all();
        info!(overlays, proxies, "transient effects torn down");
    }
}
