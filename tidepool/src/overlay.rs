//! Per-actor stacks of temporary gear overlays.
//!
//! An overlay temporarily replaces part of an actor's equipped gear for a
//! bounded duration. Overlays for one actor stack: the entry with the
//! nearest absolute deadline is the *head*, and the actor always wears the
//! head's gear merged over the baseline captured before the first overlay
//! existed. When the stack drains, the baseline is applied back and
//! forgotten.
//!
//! # Ordering
//!
//! Entries are keyed by `(deadline, id)` in a `BTreeMap`. The deadline is
//! computed once at creation and never changes, so the ordering key is
//! stable; "remaining time" is derived for display only and never feeds the
//! ordering. The id tiebreaker makes simultaneous deadlines deterministic.
//!
//! # Concurrency
//!
//! The per-actor table is a `DashMap`. Every read-modify-write sequence
//! (inspect head, remove, decide what to apply) happens under the entry's
//! shard guard, and the resulting world mutations are dispatched only after
//! the guard drops. An explicit revert racing a sweep on the same actor can
//! therefore never double-remove an entry or double-apply gear: exactly one
//! of them removes the entry, the other sees it gone and no-ops.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::error::OverlayError;
use crate::effect::SharedEffect;
use crate::gear::{self, GearPiece, GearSet};
use crate::scheduler::RegionScheduler;
use crate::time::TimeProvider;
use crate::types::ActorId;
use crate::world::WorldAccess;

/// Identity of one overlay within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(u64);

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay:{}", self.0)
    }
}

/// Ordering key of a stack entry: absolute deadline, then creation id.
type StackKey = (Duration, u64);

/// A temporary gear overlay, as handed back to the caller.
///
/// This is a descriptor of the overlay as created; the authoritative entry
/// lives inside the service. Reverting through a stale descriptor is safe —
/// if the entry is already gone the revert is a no-op.
#[derive(Debug, Clone)]
pub struct Overlay {
    id: OverlayId,
    actor: ActorId,
    created: Duration,
    duration: Duration,
    gear: GearSet,
    effect: Option<SharedEffect>,
}

impl Overlay {
    /// Identity of this overlay.
    pub fn id(&self) -> OverlayId {
        self.id
    }

    /// The actor this overlay applies to.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Provider timestamp at creation.
    pub fn created(&self) -> Duration {
        self.created
    }

    /// Effective duration (after default substitution).
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Absolute deadline: `created + duration`. Immutable; this is the
    /// ordering key within the stack.
    pub fn deadline(&self) -> Duration {
        self.created + self.duration
    }

    /// Time left until the deadline at `now`. Display/eligibility only —
    /// never an ordering key.
    pub fn remaining(&self, now: Duration) -> Duration {
        self.deadline().saturating_sub(now)
    }

    /// The sparse gear this overlay lays over the baseline.
    pub fn gear(&self) -> &GearSet {
        &self.gear
    }

    /// The owning effect, if any.
    pub fn effect(&self) -> Option<&SharedEffect> {
        self.effect.as_ref()
    }

    fn stack_key(&self) -> StackKey {
        (self.deadline(), self.id.0)
    }
}

/// One entry as stored in an actor's stack.
#[derive(Debug, Clone)]
struct StackEntry {
    overlay: Overlay,
    terminate_effect_on_revert: bool,
}

/// Stack state for one tracked actor. Exists exactly while the actor has at
/// least one overlay.
#[derive(Debug)]
struct ActorStack {
    baseline: GearSet,
    entries: BTreeMap<StackKey, StackEntry>,
}

impl ActorStack {
    fn head(&self) -> Option<&StackEntry> {
        self.entries.values().next()
    }

    fn head_key(&self) -> Option<StackKey> {
        self.entries.keys().next().copied()
    }
}

/// What a removal decided while holding the stack guard; executed after the
/// guard drops.
struct RemovalPlan {
    overlay: Overlay,
    terminate_effect: bool,
    /// Merged gear of the new head, when the removed entry was the head and
    /// the stack is still non-empty.
    apply_next: Option<GearSet>,
    /// Baseline to restore, when this removal drained the stack.
    drained_baseline: Option<GearSet>,
}

/// Service managing every actor's overlay stack.
///
/// All world writes go through the region scheduler; the service itself can
/// be called from any thread.
pub struct GearOverlays {
    scheduler: Arc<dyn RegionScheduler>,
    world: Arc<dyn WorldAccess>,
    time: Arc<dyn TimeProvider>,
    default_duration: Duration,
    stacks: DashMap<ActorId, ActorStack>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for GearOverlays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GearOverlays")
            .field("tracked_actors", &self.stacks.len())
            .field("default_duration", &self.default_duration)
            .finish()
    }
}

impl GearOverlays {
    /// Create the service.
    ///
    /// `default_duration` replaces a `Duration::ZERO` passed to
    /// [`create`](GearOverlays::create).
    pub fn new(
        scheduler: Arc<dyn RegionScheduler>,
        world: Arc<dyn WorldAccess>,
        time: Arc<dyn TimeProvider>,
        default_duration: Duration,
    ) -> Self {
        Self {
            scheduler,
            world,
            time,
            default_duration,
            stacks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an overlay on `actor` and apply the resulting head gear.
    ///
    /// On the first overlay for an actor, the actor's current gear is
    /// captured as the baseline; it is restored when the last overlay goes
    /// away. `Duration::ZERO` selects the service default duration.
    ///
    /// Must be called from the actor's owning region thread (reads gear
    /// synchronously); the write-back is dispatched through the scheduler
    /// like every other mutation.
    ///
    /// # Errors
    ///
    /// [`OverlayError::NotLive`] if the actor despawned,
    /// [`OverlayError::GearUnavailable`] if its gear cannot be read. No
    /// state is registered on error.
    pub fn create(
        &self,
        actor: ActorId,
        duration: Duration,
        gear: GearSet,
        effect: Option<SharedEffect>,
    ) -> Result<Overlay, OverlayError> {
        if !self.world.is_live(actor) {
            return Err(OverlayError::NotLive { actor });
        }
        // Read before taking the stack guard; never call the world while
        // holding it.
        let current_gear = self
            .world
            .gear_of(actor)
            .ok_or(OverlayError::GearUnavailable { actor })?;

        let duration = if duration.is_zero() {
            self.default_duration
        } else {
            duration
        };
        let overlay = Overlay {
            id: OverlayId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            actor,
            created: self.time.now(),
            duration,
            gear,
            effect,
        };

        let head_gear = {
            let mut stack = self.stacks.entry(actor).or_insert_with(|| ActorStack {
                baseline: current_gear,
                entries: BTreeMap::new(),
            });
            stack.entries.insert(
                overlay.stack_key(),
                StackEntry {
                    overlay: overlay.clone(),
                    terminate_effect_on_revert: false,
                },
            );
            let head = stack
                .head()
                .map(|h| gear::merge(&h.overlay.gear, &stack.baseline));
            head
        };

        debug!(actor = %actor, overlay = %overlay.id, deadline = ?overlay.deadline(), "overlay created");
        if let Some(merged) = head_gear {
            self.dispatch_apply(actor, merged);
        }
        Ok(overlay)
    }

    /// Revert an overlay without touching any loot list.
    ///
    /// Returns whether the overlay was still active. Reverting twice is a
    /// no-op the second time, including the effect-termination step.
    pub fn revert(&self, overlay: &Overlay) -> bool {
        self.revert_entry(overlay.actor, overlay.stack_key(), None, true)
    }

    /// Revert an overlay and reconcile a pending loot list.
    ///
    /// Any piece the reverted overlay contributed is removed from `drops`
    /// (the actor never really carried it), and if this revert drained the
    /// stack and `keep_baseline` is false, the baseline pieces are appended
    /// to `drops` instead of being re-applied for keeps.
    pub fn revert_with_drops(
        &self,
        overlay: &Overlay,
        drops: &mut Vec<GearPiece>,
        keep_baseline: bool,
    ) -> bool {
        self.revert_entry(overlay.actor, overlay.stack_key(), Some(drops), keep_baseline)
    }

    /// Arm or disarm effect termination for a forced revert of `overlay`.
    ///
    /// While armed, reverting the overlay also terminates its owning effect
    /// (if it has one and it is not already terminated). Returns false if
    /// the overlay is no longer active.
    pub fn set_terminate_effect_on_revert(&self, overlay: &Overlay, enabled: bool) -> bool {
        match self.stacks.get_mut(&overlay.actor) {
            Some(mut stack) => match stack.entries.get_mut(&overlay.stack_key()) {
                Some(entry) => {
                    entry.terminate_effect_on_revert = enabled;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Revert every overlay whose deadline has passed.
    ///
    /// Only the head of each stack ever needs checking: deadlines ascend
    /// walking away from the head, so the first unexpired head ends that
    /// actor's pass. Returns the number of overlays reverted.
    pub fn sweep(&self) -> usize {
        let now = self.time.now();
        let actors: Vec<ActorId> = self.stacks.iter().map(|entry| *entry.key()).collect();

        let mut reverted = 0;
        for actor in actors {
            loop {
                let expired = match self.stacks.get(&actor) {
                    Some(stack) => match stack.head_key() {
                        Some(key) if key.0 <= now => Some(key),
                        _ => None,
                    },
                    None => None,
                };
                match expired {
                    Some(key) => {
                        if self.revert_entry(actor, key, None, true) {
                            reverted += 1;
                        }
                        // Lost races re-peek on the next iteration.
                    }
                    None => break,
                }
            }
        }
        reverted
    }

    /// Revert every overlay on every actor (shutdown path), restoring each
    /// baseline. Returns the number of overlays reverted.
    pub fn revert_all(&self) -> usize {
        let actors: Vec<ActorId> = self.stacks.iter().map(|entry| *entry.key()).collect();

        let mut reverted = 0;
        for actor in actors {
            loop {
                let key = match self.stacks.get(&actor) {
                    Some(stack) => stack.head_key(),
                    None => None,
                };
                match key {
                    Some(key) => {
                        if self.revert_entry(actor, key, None, true) {
                            reverted += 1;
                        }
                    }
                    None => break,
                }
            }
        }
        reverted
    }

    /// Whether the actor currently has at least one overlay.
    pub fn has_overlay(&self, actor: ActorId) -> bool {
        self.stacks
            .get(&actor)
            .map(|stack| !stack.entries.is_empty())
            .unwrap_or(false)
    }

    /// The head overlay — the one whose gear the actor currently wears.
    pub fn current(&self, actor: ActorId) -> Option<Overlay> {
        self.stacks
            .get(&actor)
            .and_then(|stack| stack.head().map(|entry| entry.overlay.clone()))
    }

    /// Snapshot of the actor's stack, head first, then ascending deadline.
    pub fn all(&self, actor: ActorId) -> Vec<Overlay> {
        self.stacks
            .get(&actor)
            .map(|stack| {
                stack
                    .entries
                    .values()
                    .map(|entry| entry.overlay.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The baseline captured for the actor, while one exists.
    pub fn baseline_of(&self, actor: ActorId) -> Option<GearSet> {
        self.stacks.get(&actor).map(|stack| stack.baseline)
    }

    /// Number of actors currently tracked.
    pub fn tracked_actors(&self) -> usize {
        self.stacks.len()
    }

    /// Remove one entry and perform the consequences.
    ///
    /// The decision (was it the head, is the stack drained, should the
    /// effect terminate) is taken under the stack guard; world mutations
    /// and the loot edits run after the guard drops.
    fn revert_entry(
        &self,
        actor: ActorId,
        key: StackKey,
        mut drops: Option<&mut Vec<GearPiece>>,
        keep_baseline: bool,
    ) -> bool {
        let plan = {
            let mut stack = match self.stacks.get_mut(&actor) {
                Some(stack) => stack,
                None => return false,
            };
            let was_head = stack.head_key() == Some(key);
            let entry = match stack.entries.remove(&key) {
                Some(entry) => entry,
                None => return false,
            };
            let apply_next = if was_head {
                stack
                    .head()
                    .map(|next| gear::merge(&next.overlay.gear, &stack.baseline))
            } else {
                None
            };
            let drained_baseline = if stack.entries.is_empty() {
                Some(stack.baseline)
            } else {
                None
            };
            RemovalPlan {
                overlay: entry.overlay,
                terminate_effect: entry.terminate_effect_on_revert,
                apply_next,
                drained_baseline,
            }
        };

        if let Some(next) = plan.apply_next {
            self.dispatch_apply(actor, next);
        }

        // The reverted overlay's pieces were never really the actor's.
        if let Some(list) = drops.as_mut() {
            remove_matching(list, &plan.overlay.gear);
        }

        if let Some(baseline) = plan.drained_baseline {
            self.dispatch_apply(actor, baseline);
            self.stacks.remove_if(&actor, |_, stack| stack.entries.is_empty());
            if !keep_baseline {
                if let Some(list) = drops.as_mut() {
                    append_present(list, &baseline);
                }
            }
            debug!(actor = %actor, "overlay stack drained, baseline restored");
        }

        if plan.terminate_effect {
            if let Some(effect) = plan.overlay.effect() {
                if !effect.is_terminated() {
                    debug!(actor = %actor, effect = %effect.id(), "terminating effect on forced revert");
                    effect.terminate();
                }
            }
        }
        true
    }

    /// Dispatch a gear write to the actor's owning region thread.
    fn dispatch_apply(&self, actor: ActorId, gear: GearSet) {
        let position = match self.world.location_of(actor) {
            Some(position) => position,
            // Actor already despawned: nothing to write anywhere.
            None => return,
        };
        let world = Arc::clone(&self.world);
        self.scheduler.run_on_owner(
            position,
            Box::new(move || {
                // Liveness can only be checked at execution time.
                if world.is_live(actor) {
                    world.set_gear(actor, gear);
                }
            }),
        );
    }
}

/// Remove from `drops` one occurrence of each piece present in `gear`.
fn remove_matching(drops: &mut Vec<GearPiece>, gear: &GearSet) {
    for piece in gear.iter().flatten() {
        if let Some(index) = drops.iter().position(|drop| drop == piece) {
            drops.remove(index);
        }
    }
}

/// Append every present piece of `gear` to `drops`.
fn append_present(drops: &mut Vec<GearPiece>, gear: &GearSet) {
    drops.extend(gear.iter().flatten().copied());
}
