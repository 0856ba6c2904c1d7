/*!
 * Shared Memory Module
 * Pid slot table held in a named POSIX shared segment
 */

mod segment;
mod semaphore;
pub mod table;
pub mod types;

// Re-export public API
pub use table::SlotTable;
pub use types::Slot;
