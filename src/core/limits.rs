/*!
 * System Limits and Constants
 *
 * Centralized location for the supervisor's limits, sentinels and defaults.
 */

use std::time::Duration;

// =============================================================================
// SLOT TABLE
// =============================================================================

/// Number of children tracked concurrently by the default table
pub const MAX_SLOTS: usize = 4;

/// Slot value for "no process"
pub const EMPTY_SLOT: nix::libc::pid_t = 0;

/// Slot value for a reservation whose process has not been created yet
/// Never a valid pid, so release-by-pid can not match it
pub const PENDING_SLOT: nix::libc::pid_t = -1;

/// Default name of the shared segment
pub const DEFAULT_SHM_NAME: &str = "/myshm";

// =============================================================================
// PROCESS LAUNCH
// =============================================================================

/// Longest accepted command line in bytes
/// The operator buffer held 1024 bytes including the terminator
pub const MAX_COMMAND_LEN: usize = 1023;

/// Shell used to interpret command lines
pub const DEFAULT_SHELL: &str = "sh";

/// Exit status the shell uses when a command is found but not executable
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Exit status the shell uses when a command is not found
pub const EXIT_NOT_FOUND: i32 = 127;

// =============================================================================
// REAPER
// =============================================================================

/// Interval between monitor sweeps
/// SIGCHLD wakes the monitor early, so this only bounds the worst case
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// COMMAND LOOP
// =============================================================================

/// Operator prompt
pub const PROMPT: &str = "Enter a command (Ctrl+C to quit): ";

/// Lines buffered between the stdin reader thread and the command loop
pub const INPUT_CHANNEL_CAPACITY: usize = 16;
