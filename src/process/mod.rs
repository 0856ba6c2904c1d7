/*!
 * Process Module
 * Launching commands and reclaiming their slots
 */

pub mod launcher;
pub mod reaper;
pub mod types;

// Re-export for convenience
pub use launcher::ProcessLauncher;
pub use reaper::{on_exit, Reaper};
pub use types::{ChildExit, LaunchRecord, ReapedChild};
