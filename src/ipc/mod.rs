/*!
 * IPC Module
 * The only state shared between the supervisor and its children
 */

pub mod shm;

// Re-export for convenience
pub use shm::{Slot, SlotTable};
