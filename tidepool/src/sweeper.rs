//! Periodic expiry sweep over both services.
//!
//! Deadlines are only ever checked here (and in explicit
//! [`sweep`](crate::overlay::GearOverlays::sweep) calls); an expired overlay
//! or proxy can outlive its deadline by up to one sweep interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::overlay::GearOverlays;
use crate::registry::ProxyRegistry;
use crate::time::TimeProvider;

/// Drives the overlay and proxy sweeps on one task.
#[derive(Debug)]
pub struct Sweeper {
    overlays: Arc<GearOverlays>,
    registry: Arc<ProxyRegistry>,
}

impl Sweeper {
    /// Create a sweeper over the two services.
    pub fn new(overlays: Arc<GearOverlays>, registry: Arc<ProxyRegistry>) -> Self {
        Self { overlays, registry }
    }

    /// Run one sweep pass. Returns `(overlays_reverted, proxies_expired)`.
    pub fn sweep_once(&self) -> (usize, usize) {
        let overlays = self.overlays.sweep();
        let proxies = self.registry.sweep();
        if overlays > 0 || proxies > 0 {
            debug!(overlays, proxies, "sweep pass");
        }
        (overlays, proxies)
    }

    /// Sweep on `interval` until the task is aborted.
    pub fn spawn(self: Arc<Self>, time: Arc<dyn TimeProvider>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                time.sleep(interval).await;
                self.sweep_once();
            }
        })
    }
}
