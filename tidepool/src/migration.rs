//! Region-migration detection and vetoable hand-off.
//!
//! An actor crossing from one region into another changes owning thread.
//! Some hosts need a say in that (an effect may pin the actor in place), and
//! per-actor transient state needs to survive the crossing. The monitor
//! re-checks each tracked actor on an interval, publishes a cancellable
//! notice when the region owner changed, and brackets the whole hand-off
//! with a stance save/restore so a denied migration leaves the actor's
//! transient state exactly as it was.
//!
//! # Verdicts
//!
//! Subscribers are invoked synchronously at publish time and return an
//! explicit [`Verdict`]; any [`Verdict::Deny`] wins. There is no later or
//! asynchronous cancellation path.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::scheduler::RegionScheduler;
use crate::time::TimeProvider;
use crate::types::{ActorId, Position};
use crate::world::{StanceStore, WorldAccess};

/// A subscriber's decision on a pending migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the migration proceed.
    Allow,
    /// Veto the migration; the actor is relocated back.
    Deny,
}

/// Notification of a detected region crossing, published before the
/// migration is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationNotice {
    /// The crossing actor.
    pub actor: ActorId,
    /// Last location observed inside the old region.
    pub from: Position,
    /// Current location inside the new region.
    pub to: Position,
}

/// Synchronous migration subscriber.
pub type MigrationSubscriber = Box<dyn Fn(&MigrationNotice) -> Verdict + Send + Sync>;

/// Synchronous fan-out point for migration notices.
///
/// Every subscriber sees every notice, even after one has already denied
/// it; the verdicts are combined as "any deny wins". No subscribers means
/// every migration is allowed.
#[derive(Default)]
pub struct MigrationBus {
    subscribers: RwLock<Vec<MigrationSubscriber>>,
}

impl std::fmt::Debug for MigrationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationBus")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl MigrationBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Subscriptions cannot be withdrawn.
    pub fn subscribe(&self, subscriber: MigrationSubscriber) {
        self.subscribers.write().push(subscriber);
    }

    /// Deliver `notice` to every subscriber and combine their verdicts.
    pub fn publish(&self, notice: &MigrationNotice) -> Verdict {
        let subscribers = self.subscribers.read();
        let mut verdict = Verdict::Allow;
        for subscriber in subscribers.iter() {
            if subscriber(notice) == Verdict::Deny {
                verdict = Verdict::Deny;
            }
        }
        verdict
    }
}

/// Hook run after an accepted migration, to re-establish per-region
/// recurring effects for the actor.
pub type RegionChangeHook = Box<dyn Fn(ActorId) + Send + Sync>;

/// Outcome of one monitor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The actor is gone; tracking ends permanently.
    Stopped,
    /// First sighting; the location was recorded, nothing else happened.
    FirstObservation,
    /// Still inside the prior region; the location record advanced.
    SameRegion,
    /// A subscriber denied the crossing; the actor was sent back and the
    /// prior location was kept.
    Denied,
    /// The crossing was accepted; the region-change hook ran and the prior
    /// location advanced.
    Migrated,
}

/// Periodic region-ownership check for one actor.
///
/// There is no persistent "migrating" state: each [`check`](Self::check)
/// either completes the hand-off synchronously or leaves the record
/// untouched for the next cycle.
pub struct RegionMonitor {
    actor: ActorId,
    scheduler: Arc<dyn RegionScheduler>,
    world: Arc<dyn WorldAccess>,
    stances: Arc<dyn StanceStore>,
    bus: Arc<MigrationBus>,
    hook: Option<RegionChangeHook>,
    prior: Mutex<Option<Position>>,
}

impl std::fmt::Debug for RegionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionMonitor")
            .field("actor", &self.actor)
            .field("prior", &*self.prior.lock())
            .finish()
    }
}

impl RegionMonitor {
    /// Create a monitor for `actor`. No location is recorded until the
    /// first check.
    pub fn new(
        actor: ActorId,
        scheduler: Arc<dyn RegionScheduler>,
        world: Arc<dyn WorldAccess>,
        stances: Arc<dyn StanceStore>,
        bus: Arc<MigrationBus>,
    ) -> Self {
        Self {
            actor,
            scheduler,
            world,
            stances,
            bus,
            hook: None,
            prior: Mutex::new(None),
        }
    }

    /// Install the hook run once per accepted migration.
    pub fn with_region_change_hook(mut self, hook: RegionChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// The monitored actor.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Run one check cycle.
    pub fn check(&self) -> CheckOutcome {
        if !self.world.is_live(self.actor) {
            return CheckOutcome::Stopped;
        }
        let current = match self.world.location_of(self.actor) {
            Some(current) => current,
            None => return CheckOutcome::Stopped,
        };

        let mut prior = self.prior.lock();
        let from = match *prior {
            Some(from) => from,
            None => {
                *prior = Some(current);
                return CheckOutcome::FirstObservation;
            }
        };

        if self.scheduler.owner_of(from) == self.scheduler.owner_of(current) {
            *prior = Some(current);
            return CheckOutcome::SameRegion;
        }

        // Bracket the hand-off: saved before publish, restored on both
        // branches.
        let saved_stance = self.stances.stance_of(self.actor);
        let notice = MigrationNotice {
            actor: self.actor,
            from,
            to: current,
        };
        debug!(actor = %self.actor, ?from, to = ?current, "region crossing detected");
        let verdict = self.bus.publish(&notice);

        if let Some(stance) = saved_stance {
            self.stances.set_stance(self.actor, stance);
        }

        match verdict {
            Verdict::Deny => {
                info!(actor = %self.actor, ?from, "migration denied, relocating back");
                self.world.relocate(self.actor, from);
                self.world.release_chunk(from);
                // Prior stays put; the next cycle re-evaluates from it.
                CheckOutcome::Denied
            }
            Verdict::Allow => {
                if let Some(hook) = &self.hook {
                    hook(self.actor);
                }
                *prior = Some(current);
                info!(actor = %self.actor, to = ?current, "migration completed");
                CheckOutcome::Migrated
            }
        }
    }

    /// Drive [`check`](Self::check) on an interval until the actor is gone.
    pub fn spawn(self: Arc<Self>, time: Arc<dyn TimeProvider>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                time.sleep(interval).await;
                if self.check() == CheckOutcome::Stopped {
                    debug!(actor = %self.actor, "monitor stopped");
                    break;
                }
            }
        })
    }
}
