//! End-to-end overlay-stack scenarios against the deterministic sim world.

use std::sync::Arc;
use std::time::Duration;

use tidepool::sim::{SimScheduler, SimWorld};
use tidepool::{
    ActorId, Effect, GearOverlays, GearPiece, GearSet, LatchEffect, ManualTimeProvider, Position,
    RegionScheduler, SharedEffect, TimeProvider, WorldAccess,
};

struct Harness {
    scheduler: Arc<SimScheduler>,
    world: Arc<SimWorld>,
    time: Arc<ManualTimeProvider>,
    overlays: GearOverlays,
}

const ACTOR: ActorId = ActorId(1);
const HOME: Position = Position::new(12, 64, -30);

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let scheduler = Arc::new(SimScheduler::new());
    let world = Arc::new(SimWorld::new());
    let time = Arc::new(ManualTimeProvider::new());
    let overlays = GearOverlays::new(
        Arc::clone(&scheduler) as Arc<dyn RegionScheduler>,
        Arc::clone(&world) as Arc<dyn WorldAccess>,
        Arc::clone(&time) as Arc<dyn TimeProvider>,
        Duration::from_secs(30),
    );
    world.spawn_actor(ACTOR, HOME, baseline());
    scheduler.set_caller_region(Some(scheduler.owner_of(HOME)));
    Harness {
        scheduler,
        world,
        time,
        overlays,
    }
}

fn baseline() -> GearSet {
    [
        Some(GearPiece(101)),
        Some(GearPiece(102)),
        Some(GearPiece(103)),
        Some(GearPiece(104)),
    ]
}

fn only_head(piece: u32) -> GearSet {
    [Some(GearPiece(piece)), None, None, None]
}

#[test]
fn test_three_durations_sweep_in_deadline_order() {
    let h = harness();

    // Created in shuffled order at t=0; the stack must order by deadline.
    h.overlays
        .create(ACTOR, Duration::from_millis(2_000), only_head(2), None)
        .expect("2s overlay");
    h.overlays
        .create(ACTOR, Duration::from_millis(1_000), only_head(1), None)
        .expect("1s overlay");
    h.overlays
        .create(ACTOR, Duration::from_millis(3_000), only_head(3), None)
        .expect("3s overlay");

    // Head is the 1s entry and its gear is applied over baseline.
    assert_eq!(
        h.overlays.current(ACTOR).expect("head").duration(),
        Duration::from_millis(1_000)
    );
    assert_eq!(h.world.gear_of(ACTOR).expect("gear")[0], Some(GearPiece(1)));

    h.time.advance(Duration::from_millis(1_000));
    assert_eq!(h.overlays.sweep(), 1);
    assert_eq!(
        h.overlays.current(ACTOR).expect("head").duration(),
        Duration::from_millis(2_000)
    );
    assert_eq!(h.world.gear_of(ACTOR).expect("gear")[0], Some(GearPiece(2)));

    h.time.advance(Duration::from_millis(2_000));
    // Both remaining entries are past deadline at t=3000.
    assert_eq!(h.overlays.sweep(), 2);
    assert!(!h.overlays.has_overlay(ACTOR));
    assert_eq!(h.world.gear_of(ACTOR).expect("gear"), baseline());
}

#[test]
fn test_applied_gear_always_head_over_baseline() {
    let h = harness();

    let partial: GearSet = [None, Some(GearPiece(22)), None, None];
    h.overlays
        .create(ACTOR, Duration::from_millis(1_000), partial, None)
        .expect("partial overlay");

    // Overridden slot from the overlay, every other slot from baseline.
    assert_eq!(
        h.world.gear_of(ACTOR).expect("gear"),
        [
            Some(GearPiece(101)),
            Some(GearPiece(22)),
            Some(GearPiece(103)),
            Some(GearPiece(104)),
        ]
    );
}

#[test]
fn test_non_head_revert_keeps_applied_gear() {
    let h = harness();

    h.overlays
        .create(ACTOR, Duration::from_millis(1_000), only_head(1), None)
        .expect("head");
    let tail = h
        .overlays
        .create(ACTOR, Duration::from_millis(9_000), only_head(9), None)
        .expect("tail");

    let applied = h.world.gear_of(ACTOR).expect("gear");
    assert!(h.overlays.revert(&tail));
    assert_eq!(h.world.gear_of(ACTOR).expect("gear"), applied);
    assert_eq!(h.overlays.all(ACTOR).len(), 1);
}

#[test]
fn test_forced_revert_terminates_owning_effect() {
    let h = harness();
    let effect = Arc::new(LatchEffect::new(tidepool::EffectId(5)));

    let overlay = h
        .overlays
        .create(
            ACTOR,
            Duration::from_millis(1_000),
            only_head(1),
            Some(Arc::clone(&effect) as SharedEffect),
        )
        .expect("overlay");

    // Without the flag a revert leaves the effect alone.
    assert!(h.overlays.set_terminate_effect_on_revert(&overlay, true));
    assert!(h.overlays.set_terminate_effect_on_revert(&overlay, false));
    assert!(h.overlays.revert(&overlay));
    assert!(!effect.is_terminated());

    let overlay = h
        .overlays
        .create(
            ACTOR,
            Duration::from_millis(1_000),
            only_head(1),
            Some(Arc::clone(&effect) as SharedEffect),
        )
        .expect("overlay");
    assert!(h.overlays.set_terminate_effect_on_revert(&overlay, true));
    assert!(h.overlays.revert(&overlay));
    assert!(effect.is_terminated());
}

#[test]
fn test_drops_reconciliation_on_death() {
    let h = harness();

    let overlay = h
        .overlays
        .create(ACTOR, Duration::from_millis(1_000), only_head(7), None)
        .expect("overlay");

    // Host computed the death drops from the applied gear: the overlay
    // piece plus the visible baseline pieces.
    let mut drops = vec![
        GearPiece(7),
        GearPiece(102),
        GearPiece(103),
        GearPiece(104),
    ];
    assert!(h.overlays.revert_with_drops(&overlay, &mut drops, false));

    // The borrowed piece is withheld; the hidden baseline head piece joins
    // the drops alongside the already-listed baseline pieces.
    assert!(!drops.contains(&GearPiece(7)));
    assert!(drops.contains(&GearPiece(101)));
    assert_eq!(drops.len(), 7);
}

#[test]
fn test_cross_region_caller_round_trip() {
    let h = harness();
    // Re-home the caller far away from the actor.
    h.scheduler
        .set_caller_region(Some(h.scheduler.owner_of(Position::new(-4_000, 64, 4_000))));

    let overlay = h
        .overlays
        .create(ACTOR, Duration::from_millis(1_000), only_head(1), None)
        .expect("overlay");
    assert_eq!(h.world.gear_of(ACTOR).expect("gear"), baseline());

    h.scheduler.drain_all();
    assert_eq!(h.world.gear_of(ACTOR).expect("gear")[0], Some(GearPiece(1)));

    assert!(h.overlays.revert(&overlay));
    h.scheduler.drain_all();
    assert_eq!(h.world.gear_of(ACTOR).expect("gear"), baseline());
}

#[test]
fn test_sweep_never_fires_early() {
    let h = harness();
    h.overlays
        .create(ACTOR, Duration::from_millis(1_000), only_head(1), None)
        .expect("overlay");

    for _ in 0..9 {
        h.time.advance(Duration::from_millis(100));
        assert_eq!(h.overlays.sweep(), 0);
    }
    h.time.advance(Duration::from_millis(100));
    assert_eq!(h.overlays.sweep(), 1);
}
