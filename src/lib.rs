/*!
 * PID Supervisor Library
 * Shared pid table, launcher and reaper exposed as a library
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod process;
pub mod shell;
pub mod signals;

// Re-exports
pub use crate::core::errors::{
    ConfigError, LaunchError, ResourceError, SerializableError, SupervisorError,
};
pub use crate::core::{Pid, SlotIndex, SupervisorConfig, WorkRequest};
pub use ipc::{Slot, SlotTable};
pub use monitoring::init_tracing;
pub use process::{on_exit, ChildExit, ProcessLauncher, ReapedChild, Reaper};
pub use shell::{spawn_stdin_reader, CommandLoop, LoopExit};
