//! Error types for tidepool services.

use crate::types::{ActorId, ProxyId};
use thiserror::Error;

/// Errors from overlay-stack operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The target actor is not live, so no overlay can be created for it.
    #[error("{actor} is not live")]
    NotLive {
        /// The actor that was targeted.
        actor: ActorId,
    },

    /// The actor's current gear could not be read for baseline capture.
    #[error("gear of {actor} is unavailable")]
    GearUnavailable {
        /// The actor whose gear could not be read.
        actor: ActorId,
    },
}

/// Errors from proxy-registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The proxy identity is not known to the world; nothing was registered.
    #[error("{proxy} is unknown to the world")]
    UnknownProxy {
        /// The proxy that failed validation.
        proxy: ProxyId,
    },
}

/// Errors surfaced by the host world when a dispatched mutation fails.
///
/// A target that simply despawned is NOT an error — dispatched actions treat
/// that as a silent no-op. `WorldError` is for genuine host failures, which
/// sweeps log and otherwise ignore so one bad entry cannot stall the rest.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The host refused or failed to despawn the proxy.
    #[error("despawn of {proxy} failed: {reason}")]
    DespawnFailed {
        /// The proxy the despawn targeted.
        proxy: ProxyId,
        /// Host-provided failure description.
        reason: String,
    },
}
