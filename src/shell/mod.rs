/*!
 * Shell Module
 * Operator-facing command loop
 */

pub mod command_loop;
pub mod input;

pub use command_loop::{CommandLoop, LoopExit};
pub use input::spawn_stdin_reader;
