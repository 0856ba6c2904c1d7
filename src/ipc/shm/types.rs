/*!
 * Slot Table Types
 * Views over raw slot values
 */

use crate::core::limits::{EMPTY_SLOT, PENDING_SLOT};
use crate::core::types::Pid;
use nix::libc;
use serde::{Deserialize, Serialize};

/// In-segment layout: guard first, then the slots
#[repr(C)]
pub(crate) struct TableLayout<const N: usize> {
    pub guard: libc::sem_t,
    pub slots: [Pid; N],
}

/// Decoded slot value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "pid")]
pub enum Slot {
    /// Free for reservation
    Empty,
    /// Reserved by a launch that has not produced a pid yet
    Pending,
    /// Tracking a live child
    Occupied(Pid),
}

impl Slot {
    pub(crate) fn from_raw(raw: Pid) -> Self {
        match raw {
            EMPTY_SLOT => Slot::Empty,
            PENDING_SLOT => Slot::Pending,
            pid if pid > 0 => Slot::Occupied(pid),
            // Anything else was never written by us; treat as taken
            _ => Slot::Pending,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn pid(&self) -> Option<Pid> {
        match self {
            Slot::Occupied(pid) => Some(*pid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_decoding() {
        assert_eq!(Slot::from_raw(0), Slot::Empty);
        assert_eq!(Slot::from_raw(-1), Slot::Pending);
        assert_eq!(Slot::from_raw(4242), Slot::Occupied(4242));
        assert_eq!(Slot::from_raw(-7), Slot::Pending);
    }

    #[test]
    fn test_slot_serialization() {
        let json = serde_json::to_string(&Slot::Occupied(12)).unwrap();
        assert_eq!(json, r#"{"state":"occupied","pid":12}"#);
        let back: Slot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pid(), Some(12));
    }
}
