//! Types shared by every protocol session: identities, timestamps and fill-once slots.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds on the substrate's monotonic clock.
pub type Timestamp = u64;

/// Authenticated identity of a participant, as provided by the substrate.
pub type PlayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot is already filled")]
pub struct SlotOccupied;

/// A per-contributor slot that can be written exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "value", rename_all = "snake_case")]
pub enum Slot<T> {
    Empty,
    Filled(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Empty
    }
}

impl<T> Slot<T> {
    pub fn is_filled(&self) -> bool {
        matches!(self, Slot::Filled(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Filled(value) => Some(value),
            Slot::Empty => None,
        }
    }

    /// Write the slot. An occupied slot is never overwritten.
    pub fn fill(&mut self, value: T) -> Result<(), SlotOccupied> {
        if self.is_filled() {
            return Err(SlotOccupied);
        }
        *self = Slot::Filled(value);
        Ok(())
    }
}

/// Position of `player` inside an ordered roster.
pub fn position_of(roster: &[PlayerId], player: PlayerId) -> Option<usize> {
    roster.iter().position(|p| *p == player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn slot_is_fill_once() {
        let mut slot = Slot::default();
        assert!(!slot.is_filled());
        slot.fill(7u64).unwrap();
        assert_eq!(slot.fill(9), Err(SlotOccupied));
        assert_eq!(slot.get(), Some(&7));
    }

    #[test]
    fn slot_round_trips_with_serde() {
        assert_round_trip_eq(&Slot::<u64>::Empty);
        assert_round_trip_eq(&Slot::Filled(42u64));
    }

    #[test]
    fn roster_position_lookup() {
        let roster = vec![10, 20, 30];
        assert_eq!(position_of(&roster, 20), Some(1));
        assert_eq!(position_of(&roster, 40), None);
    }
}
