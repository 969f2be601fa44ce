//! Equipped-gear slots and the per-slot merge rule.
//!
//! An actor exposes a fixed array of equipment slots. Overlays carry a
//! *sparse* [`GearSet`]: `Some(piece)` overrides that slot, `None` leaves
//! the slot to whatever sits underneath (the baseline, or ultimately an
//! empty slot). A baseline is also a `GearSet`, where `None` means the slot
//! was empty when it was captured.

use serde::{Deserialize, Serialize};

/// Number of equipment slots on an actor.
pub const GEAR_SLOTS: usize = 4;

/// Named slot indices into a [`GearSet`].
pub mod slot {
    /// Head slot.
    pub const HEAD: usize = 0;
    /// Chest slot.
    pub const CHEST: usize = 1;
    /// Legs slot.
    pub const LEGS: usize = 2;
    /// Feet slot.
    pub const FEET: usize = 3;
}

/// A single equippable piece, identified by its kind.
///
/// Equality is what the revert path uses to match reverted overlay pieces
/// against a pending loot list, so two pieces of the same kind are
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GearPiece(pub u32);

/// A full set of gear slots, sparse per slot.
pub type GearSet = [Option<GearPiece>; GEAR_SLOTS];

/// A `GearSet` with every slot empty.
pub const EMPTY_GEAR: GearSet = [None; GEAR_SLOTS];

/// Merge an overlay over a baseline, slot by slot.
///
/// An overlay `Some` wins for its slot; an overlay `None` falls back to the
/// baseline value for that slot. This is the only merge rule in the crate:
/// what an actor wears while a stack is active is always
/// `merge(head, baseline)`.
pub fn merge(overlay: &GearSet, baseline: &GearSet) -> GearSet {
    let mut out = *baseline;
    for (slot, piece) in overlay.iter().enumerate() {
        if piece.is_some() {
            out[slot] = *piece;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_override_and_fallback() {
        let baseline: GearSet = [Some(GearPiece(1)), Some(GearPiece(2)), None, Some(GearPiece(4))];
        let overlay: GearSet = [Some(GearPiece(10)), None, Some(GearPiece(30)), None];

        let merged = merge(&overlay, &baseline);
        assert_eq!(merged[slot::HEAD], Some(GearPiece(10))); // overridden
        assert_eq!(merged[slot::CHEST], Some(GearPiece(2))); // fallback
        assert_eq!(merged[slot::LEGS], Some(GearPiece(30))); // overridden over empty
        assert_eq!(merged[slot::FEET], Some(GearPiece(4))); // fallback
    }

    #[test]
    fn test_merge_empty_overlay_is_identity() {
        let baseline: GearSet = [Some(GearPiece(1)), None, Some(GearPiece(3)), None];
        assert_eq!(merge(&EMPTY_GEAR, &baseline), baseline);
    }

    #[test]
    fn test_merge_full_overlay_hides_baseline() {
        let baseline: GearSet = [Some(GearPiece(1)), Some(GearPiece(2)), Some(GearPiece(3)), Some(GearPiece(4))];
        let overlay: GearSet = [Some(GearPiece(9)), Some(GearPiece(9)), Some(GearPiece(9)), Some(GearPiece(9))];
        assert_eq!(merge(&overlay, &baseline), overlay);
    }
}
