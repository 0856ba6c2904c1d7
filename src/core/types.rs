/*!
 * Core Types
 * Common types used across the supervisor
 */

use serde::{Deserialize, Serialize};

/// OS process ID type (matches `pid_t`)
pub type Pid = nix::libc::pid_t;

/// Position of a slot inside the shared table
pub type SlotIndex = usize;

/// Unit of work submitted by the operator
///
/// `filename` is reserved: it is carried with the request but never read by
/// the launch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl WorkRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            filename: None,
        }
    }
}
