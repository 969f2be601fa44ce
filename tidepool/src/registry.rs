//! Expiry-tracked registry of ephemeral world-object proxies.
//!
//! Effects spawn short-lived world objects (falling debris, placeholder
//! stands) through host machinery the crate does not own; the registry is
//! the bookkeeping that guarantees none of them leaks. Every proxy is
//! registered with its owning effect and swept on two tiers:
//!
//! - short tier (default 5 s) for entries flagged TTL-eligible;
//! - long tier (default 120 s) for everything, as a safety net against
//!   proxies whose owner forgot them.
//!
//! Destruction always goes through the region scheduler against the proxy's
//! last-known location. A per-entry destroy failure is logged and never
//! stops the rest of a sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::scheduler::RegionScheduler;
use crate::time::TimeProvider;
use crate::types::{EffectId, Position, ProxyId};
use crate::world::WorldAccess;

/// One-shot callback run when a proxy settles into a permanent form.
pub type SettleCallback = Box<dyn FnOnce(ProxyId) + Send + Sync + 'static>;

struct ProxyEntry {
    /// Location at registration; destruction falls back to it when the
    /// world no longer knows the proxy.
    location: Position,
    created: Duration,
    owner: EffectId,
    ttl_eligible: bool,
    on_settle: Option<SettleCallback>,
}

impl std::fmt::Debug for ProxyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEntry")
            .field("location", &self.location)
            .field("created", &self.created)
            .field("owner", &self.owner)
            .field("ttl_eligible", &self.ttl_eligible)
            .field("has_on_settle", &self.on_settle.is_some())
            .finish()
    }
}

/// Registry of live proxies, keyed by identity and indexed by owning
/// effect.
///
/// The by-effect index is always exactly the set of entries whose owner is
/// that effect: registration edits both maps while holding the primary
/// entry's shard guard, and every removal path re-checks its reason for
/// removing under that guard before destroying anything, so an identity
/// that was concurrently re-registered is never torn down on stale
/// grounds.
pub struct ProxyRegistry {
    scheduler: Arc<dyn RegionScheduler>,
    world: Arc<dyn WorldAccess>,
    time: Arc<dyn TimeProvider>,
    short_ttl: Duration,
    long_ttl: Duration,
    entries: DashMap<ProxyId, ProxyEntry>,
    by_effect: DashMap<EffectId, HashSet<ProxyId>>,
}

impl std::fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("entries", &self.entries.len())
            .field("short_ttl", &self.short_ttl)
            .field("long_ttl", &self.long_ttl)
            .finish()
    }
}

impl ProxyRegistry {
    /// Create the registry with the two expiry tiers.
    pub fn new(
        scheduler: Arc<dyn RegionScheduler>,
        world: Arc<dyn WorldAccess>,
        time: Arc<dyn TimeProvider>,
        short_ttl: Duration,
        long_ttl: Duration,
    ) -> Self {
        Self {
            scheduler,
            world,
            time,
            short_ttl,
            long_ttl,
            entries: DashMap::new(),
            by_effect: DashMap::new(),
        }
    }

    /// Track a proxy under its owning effect.
    ///
    /// `ttl_eligible` selects the short expiry tier; the long safety-net
    /// tier applies regardless. Re-registering an identity replaces the old
    /// entry (age restarts) and re-points the by-effect index.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownProxy`] when the world has no location for
    /// the proxy; nothing is registered in that case.
    pub fn register(
        &self,
        proxy: ProxyId,
        owner: EffectId,
        ttl_eligible: bool,
    ) -> Result<(), RegistryError> {
        let location = self
            .world
            .proxy_location(proxy)
            .ok_or(RegistryError::UnknownProxy { proxy })?;

        let fresh = ProxyEntry {
            location,
            created: self.time.now(),
            owner,
            ttl_eligible,
            on_settle: None,
        };
        // Both index edits happen while the primary entry guard is held, so
        // two registers racing on the same identity cannot leave the index
        // pointing at a stale owner. Lock order is entries -> by_effect
        // everywhere; nothing locks entries while holding a by_effect
        // guard.
        match self.entries.entry(proxy) {
            Entry::Occupied(mut occupied) => {
                let previous_owner = occupied.get().owner;
                occupied.insert(fresh);
                if previous_owner != owner {
                    self.unindex(previous_owner, proxy);
                }
                self.by_effect.entry(owner).or_default().insert(proxy);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                self.by_effect.entry(owner).or_default().insert(proxy);
            }
        }
        debug!(proxy = %proxy, owner = %owner, ttl_eligible, "proxy registered");
        Ok(())
    }

    /// Attach the one-shot settle callback to a tracked proxy.
    ///
    /// Replaces any callback already set. Returns false if the proxy is not
    /// tracked.
    pub fn set_on_settle(&self, proxy: ProxyId, callback: SettleCallback) -> bool {
        match self.entries.get_mut(&proxy) {
            Some(mut entry) => {
                entry.on_settle = Some(callback);
                true
            }
            None => false,
        }
    }

    /// Fire the proxy's settle callback, if one is set and unfired.
    ///
    /// The registry never calls this itself; the host calls it when it
    /// observes the proxy settling (touching ground, typically). The
    /// callback runs at most once; the entry stays tracked either way.
    /// Returns whether a callback ran.
    pub fn try_settle(&self, proxy: ProxyId) -> bool {
        // Take the callback under the guard, run it after.
        let callback = self
            .entries
            .get_mut(&proxy)
            .and_then(|mut entry| entry.on_settle.take());
        match callback {
            Some(callback) => {
                debug!(proxy = %proxy, "proxy settled");
                callback(proxy);
                true
            }
            None => false,
        }
    }

    /// Stop tracking a proxy and dispatch its destruction. Idempotent:
    /// returns false if it was not tracked.
    pub fn remove(&self, proxy: ProxyId) -> bool {
        match self.entries.remove(&proxy) {
            Some((_, entry)) => {
                self.unindex(entry.owner, proxy);
                self.dispatch_destroy(proxy, entry.location);
                true
            }
            None => false,
        }
    }

    /// Remove every proxy owned by `effect`. Entries of other owners are
    /// untouched. Returns the number removed.
    pub fn remove_all_for_owner(&self, effect: EffectId) -> usize {
        let owned = match self.by_effect.remove(&effect) {
            Some((_, owned)) => owned,
            None => return 0,
        };
        let mut removed = 0;
        for proxy in owned {
            // Ownership is re-checked under the entry guard: an identity
            // re-registered to a different effect since the index snapshot
            // is not this owner's to destroy.
            let entry = self
                .entries
                .remove_if(&proxy, |_, entry| entry.owner == effect);
            if let Some((_, entry)) = entry {
                self.unindex(effect, proxy);
                self.dispatch_destroy(proxy, entry.location);
                removed += 1;
            }
        }
        debug!(owner = %effect, removed, "owner proxies removed");
        removed
    }

    /// Remove every tracked proxy (shutdown path), dispatching destruction
    /// for each. Returns the number removed.
    pub fn remove_all(&self) -> usize {
        let proxies: Vec<ProxyId> = self.entries.iter().map(|entry| *entry.key()).collect();
        let mut removed = 0;
        for proxy in proxies {
            if self.remove(proxy) {
                removed += 1;
            }
        }
        removed
    }

    /// Expire every entry past its tier deadline. Returns the number
    /// expired.
    pub fn sweep(&self) -> usize {
        let now = self.time.now();
        let candidates: Vec<ProxyId> = self
            .entries
            .iter()
            .filter(|entry| self.is_due(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();

        let mut swept = 0;
        for proxy in candidates {
            if self.expire_if_due(proxy, now) {
                swept += 1;
            }
        }
        if swept > 0 {
            debug!(swept, remaining = self.entries.len(), "proxy sweep");
        }
        swept
    }

    /// Whether the proxy is currently tracked.
    pub fn is_tracked(&self, proxy: ProxyId) -> bool {
        self.entries.contains_key(&proxy)
    }

    /// Snapshot of the proxies owned by `effect`.
    pub fn owned_by(&self, effect: EffectId) -> Vec<ProxyId> {
        self.by_effect
            .get(&effect)
            .map(|owned| owned.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of tracked proxies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no proxy is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_due(&self, entry: &ProxyEntry, now: Duration) -> bool {
        let age = now.saturating_sub(entry.created);
        (entry.ttl_eligible && age >= self.short_ttl) || age >= self.long_ttl
    }

    /// Expire `proxy` only if it is still past a tier at `now`, deciding
    /// under the entry guard. The candidate list a sweep collected is just
    /// an observation; an identity that was removed and re-registered in
    /// the meantime carries a restarted age and survives.
    fn expire_if_due(&self, proxy: ProxyId, now: Duration) -> bool {
        let removed = self
            .entries
            .remove_if(&proxy, |_, entry| self.is_due(entry, now));
        match removed {
            Some((_, entry)) => {
                self.unindex(entry.owner, proxy);
                self.dispatch_destroy(proxy, entry.location);
                true
            }
            None => false,
        }
    }

    fn unindex(&self, owner: EffectId, proxy: ProxyId) {
        if let Some(mut owned) = self.by_effect.get_mut(&owner) {
            owned.remove(&proxy);
        }
        self.by_effect.remove_if(&owner, |_, owned| owned.is_empty());
    }

    /// Dispatch destruction to the proxy's owning region thread.
    ///
    /// The world is asked for a fresh location first; the registration
    /// location is the fallback for a proxy the world already dropped.
    fn dispatch_destroy(&self, proxy: ProxyId, registered_at: Position) {
        let position = self.world.proxy_location(proxy).unwrap_or(registered_at);
        let world = Arc::clone(&self.world);
        self.scheduler.run_on_owner(
            position,
            Box::new(move || {
                // A host failure must not escape into whatever tick is
                // draining the owner queue.
                if let Err(error) = world.despawn_proxy(proxy) {
                    warn!(proxy = %proxy, %error, "proxy destruction failed");
                }
            }),
        );
    }
}
