//! Effect lifecycle boundary.
//!
//! Overlays and proxies can be owned by an effect — a host-side lifecycle
//! object (an active ability instance, typically). The crate only ever asks
//! two things of it: "are you already over?" and, for overlays carrying the
//! force-terminate flag, "end now".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::EffectId;

/// Host-side effect lifecycle, as seen by this crate.
pub trait Effect: Send + Sync + std::fmt::Debug {
    /// Stable identity of this effect instance.
    fn id(&self) -> EffectId;

    /// Whether the effect has already been terminated.
    fn is_terminated(&self) -> bool;

    /// Terminate the effect. Must be idempotent.
    fn terminate(&self);
}

/// Shared handle to an effect.
pub type SharedEffect = Arc<dyn Effect>;

/// Minimal [`Effect`] whose termination is a one-way flag.
///
/// Useful for hosts whose effects need no teardown beyond the registries in
/// this crate, and for tests asserting that termination happened exactly
/// once.
#[derive(Debug)]
pub struct LatchEffect {
    id: EffectId,
    terminated: AtomicBool,
}

impl LatchEffect {
    /// Create a live latch effect.
    pub fn new(id: EffectId) -> Self {
        Self {
            id,
            terminated: AtomicBool::new(false),
        }
    }
}

impl Effect for LatchEffect {
    fn id(&self) -> EffectId {
        self.id
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}
