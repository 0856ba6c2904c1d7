/*!
 * Monitoring Module
 * Structured logging setup
 */

pub mod tracer;

pub use tracer::{generate_launch_id, init_tracing};
