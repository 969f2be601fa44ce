//! End-to-end proxy-registry scenarios against the deterministic sim world.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tidepool::sim::{SimScheduler, SimWorld};
use tidepool::{
    EffectId, ManualTimeProvider, Position, ProxyId, ProxyRegistry, RegionScheduler, RegistryError,
    TimeProvider, WorldAccess,
};

struct Harness {
    scheduler: Arc<SimScheduler>,
    world: Arc<SimWorld>,
    time: Arc<ManualTimeProvider>,
    registry: ProxyRegistry,
}

const SPOT: Position = Position::new(0, 70, 0);

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let scheduler = Arc::new(SimScheduler::new());
    let world = Arc::new(SimWorld::new());
    let time = Arc::new(ManualTimeProvider::new());
    let registry = ProxyRegistry::new(
        Arc::clone(&scheduler) as Arc<dyn RegionScheduler>,
        Arc::clone(&world) as Arc<dyn WorldAccess>,
        Arc::clone(&time) as Arc<dyn TimeProvider>,
        Duration::from_millis(5_000),
        Duration::from_millis(120_000),
    );
    scheduler.set_caller_region(Some(scheduler.owner_of(SPOT)));
    Harness {
        scheduler,
        world,
        time,
        registry,
    }
}

#[test]
fn test_two_tier_expiry_timeline() {
    let h = harness();
    h.world.spawn_proxy(ProxyId(1), SPOT);
    h.world.spawn_proxy(ProxyId(2), SPOT);
    h.registry
        .register(ProxyId(1), EffectId(1), true)
        .expect("eligible proxy");
    h.registry
        .register(ProxyId(2), EffectId(1), false)
        .expect("pinned proxy");

    // t=4999: both below every tier.
    h.time.advance(Duration::from_millis(4_999));
    assert_eq!(h.registry.sweep(), 0);
    assert_eq!(h.registry.len(), 2);

    // t=5001: the eligible one expires, the pinned one stays.
    h.time.advance(Duration::from_millis(2));
    assert_eq!(h.registry.sweep(), 1);
    assert!(!h.registry.is_tracked(ProxyId(1)));
    assert!(h.registry.is_tracked(ProxyId(2)));
    assert!(!h.world.proxy_alive(ProxyId(1)));
    assert!(h.world.proxy_alive(ProxyId(2)));

    // t=120001: the safety net takes the pinned one too.
    h.time.advance(Duration::from_millis(115_000));
    assert_eq!(h.registry.sweep(), 1);
    assert!(h.registry.is_empty());
    assert!(!h.world.proxy_alive(ProxyId(2)));
}

#[test]
fn test_owner_scoped_removal_leaves_other_owners_intact() {
    let h = harness();
    for id in 1..=5 {
        h.world.spawn_proxy(ProxyId(id), SPOT);
    }
    for id in 1..=3 {
        h.registry
            .register(ProxyId(id), EffectId(10), true)
            .expect("register");
    }
    h.registry
        .register(ProxyId(4), EffectId(20), true)
        .expect("register");
    h.registry
        .register(ProxyId(5), EffectId(30), false)
        .expect("register");

    assert_eq!(h.registry.remove_all_for_owner(EffectId(10)), 3);
    assert!(h.registry.owned_by(EffectId(10)).is_empty());
    assert_eq!(h.registry.owned_by(EffectId(20)), vec![ProxyId(4)]);
    assert_eq!(h.registry.owned_by(EffectId(30)), vec![ProxyId(5)]);
    assert_eq!(h.registry.len(), 2);
    for id in 1..=3 {
        assert!(!h.world.proxy_alive(ProxyId(id)));
    }
    assert!(h.world.proxy_alive(ProxyId(4)));
}

#[test]
fn test_register_validates_against_world() {
    let h = harness();
    assert!(matches!(
        h.registry.register(ProxyId(404), EffectId(1), true),
        Err(RegistryError::UnknownProxy { .. })
    ));
    assert!(h.registry.is_empty());
}

#[test]
fn test_settle_then_expire() {
    let h = harness();
    h.world.spawn_proxy(ProxyId(1), SPOT);
    h.registry
        .register(ProxyId(1), EffectId(1), true)
        .expect("register");

    let settled = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&settled);
    h.registry.set_on_settle(
        ProxyId(1),
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );

    // The host observes the landing; the proxy stays tracked and still
    // expires on its tier afterwards.
    assert!(h.registry.try_settle(ProxyId(1)));
    assert!(h.registry.is_tracked(ProxyId(1)));
    h.time.advance(Duration::from_millis(6_000));
    assert_eq!(h.registry.sweep(), 1);
    assert_eq!(settled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reregistration_restarts_age() {
    let h = harness();
    h.world.spawn_proxy(ProxyId(1), SPOT);
    h.registry
        .register(ProxyId(1), EffectId(1), true)
        .expect("register");

    h.time.advance(Duration::from_millis(4_000));
    h.registry
        .register(ProxyId(1), EffectId(1), true)
        .expect("re-register");

    // Old age would have expired it here; the fresh entry survives.
    h.time.advance(Duration::from_millis(2_000));
    assert_eq!(h.registry.sweep(), 0);
    h.time.advance(Duration::from_millis(3_001));
    assert_eq!(h.registry.sweep(), 1);
}

#[test]
fn test_remote_destroy_applies_after_owner_drain() {
    let h = harness();
    let far = Position::new(10_000, 70, 10_000);
    h.world.spawn_proxy(ProxyId(1), far);
    h.registry
        .register(ProxyId(1), EffectId(1), true)
        .expect("register");

    h.time.advance(Duration::from_millis(6_000));
    assert_eq!(h.registry.sweep(), 1);
    assert!(h.world.proxy_alive(ProxyId(1)));
    h.scheduler.drain_all();
    assert!(!h.world.proxy_alive(ProxyId(1)));
}
