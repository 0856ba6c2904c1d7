/*!
 * Process Types
 * Launch bookkeeping and exit classification
 */

use crate::core::limits::{EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND};
use crate::core::types::{Pid, SlotIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Supervisor-local metadata for a running child
///
/// Used for logging only; the slot table stays the single source of truth
/// for which pids are tracked.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub launch_id: String,
    pub command: String,
    pub started: Instant,
}

/// How a tracked child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ChildExit {
    /// Normal exit with a status code
    Exited(i32),
    /// Killed by a signal number
    Signaled(i32),
    /// Not waitable any more (already reaped elsewhere or not our child)
    Vanished,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        matches!(self, ChildExit::Exited(0))
    }

    /// The shell could not run the command it was given
    pub fn exec_failed(&self) -> bool {
        matches!(
            self,
            ChildExit::Exited(EXIT_NOT_EXECUTABLE) | ChildExit::Exited(EXIT_NOT_FOUND)
        )
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with status {}", code),
            ChildExit::Signaled(signal) => write!(f, "killed by signal {}", signal),
            ChildExit::Vanished => write!(f, "vanished"),
        }
    }
}

/// A child whose slot the reaper freed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReapedChild {
    pub pid: Pid,
    pub slot: SlotIndex,
    pub exit: ChildExit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_classification() {
        assert!(ChildExit::Exited(0).success());
        assert!(!ChildExit::Exited(1).success());
        assert!(ChildExit::Exited(127).exec_failed());
        assert!(ChildExit::Exited(126).exec_failed());
        assert!(!ChildExit::Signaled(9).exec_failed());
        assert_eq!(ChildExit::Signaled(9).to_string(), "killed by signal 9");
    }
}
