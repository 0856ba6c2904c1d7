/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared table errors with serialization support
///
/// Everything here is fatal at startup: without the table nothing can be
/// tracked.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ResourceError {
    #[error("Invalid shared segment name '{0}'")]
    #[diagnostic(
        code(resource::invalid_name),
        help("Segment names must start with '/' and contain no other '/'.")
    )]
    InvalidName(String),

    #[error("Slot table capacity must be at least one slot")]
    #[diagnostic(code(resource::invalid_capacity))]
    InvalidCapacity,

    #[error("Shared segment '{name}' unavailable: {reason}")]
    #[diagnostic(
        code(resource::segment_unavailable),
        help("Check /dev/shm permissions and that the segment exists when attaching.")
    )]
    SegmentUnavailable { name: String, reason: String },

    #[error("Failed to map shared segment '{name}': {reason}")]
    #[diagnostic(
        code(resource::map_failed),
        help("System may be low on memory or address space.")
    )]
    MapFailed { name: String, reason: String },

    #[error("Table guard failed: {0}")]
    #[diagnostic(
        code(resource::guard_failed),
        help("The semaphore inside the segment is unusable. Restart the supervisor.")
    )]
    GuardFailed(String),

    #[error("Failed to remove shared segment '{name}': {reason}")]
    #[diagnostic(code(resource::unlink_failed))]
    UnlinkFailed { name: String, reason: String },

    #[error("Pid {0} can not be stored in a slot")]
    #[diagnostic(
        code(resource::invalid_pid),
        help("Only positive OS process ids are tracked.")
    )]
    InvalidPid(i32),

    #[error("Slot {index} is not awaiting a pid")]
    #[diagnostic(code(resource::invalid_slot))]
    InvalidSlot { index: usize },
}

/// Launch errors with serialization support
///
/// All of these are recoverable: they are reported to the operator and the
/// command loop keeps running.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LaunchError {
    #[error("All {capacity} slots are busy")]
    #[diagnostic(
        code(launch::no_capacity),
        help("Wait for a running command to finish, then try again.")
    )]
    NoCapacity { capacity: usize },

    #[error("Failed to create process: {0}")]
    #[diagnostic(
        code(launch::spawn_failed),
        help("Check system resources and process limits. Re-issue the command to retry.")
    )]
    SpawnFailed(String),

    #[error("Failed to execute '{shell}': {reason}")]
    #[diagnostic(
        code(launch::exec_failed),
        help("The shell image could not be loaded. Check SUPERVISOR_SHELL.")
    )]
    ExecFailed { shell: String, reason: String },

    #[error("Invalid command: {0}")]
    #[diagnostic(code(launch::invalid_command))]
    InvalidCommand(String),

    #[error("Resource error: {0}")]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Unset the variable to fall back to the default.")
    )]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Unified supervisor error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum SupervisorError {
    #[error("Resource error: {0}")]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error("Launch error: {0}")]
    #[diagnostic(transparent)]
    Launch(#[from] LaunchError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(supervisor::io_error),
        help("Operator input or output failed.")
    )]
    Io(String),
}

impl From<std::io::Error> for SupervisorError {
    fn from(err: std::io::Error) -> Self {
        SupervisorError::Io(err.to_string())
    }
}

/// Serializable error representation for structured log output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub error_type: String,
    pub message: String,
}

impl SerializableError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// JSON form, falling back to the plain message
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

impl From<&LaunchError> for SerializableError {
    fn from(err: &LaunchError) -> Self {
        let error_type = match err {
            LaunchError::NoCapacity { .. } => "no_capacity",
            LaunchError::SpawnFailed(_) => "spawn_failed",
            LaunchError::ExecFailed { .. } => "exec_failed",
            LaunchError::InvalidCommand(_) => "invalid_command",
            LaunchError::Resource(_) => "resource_error",
        };
        SerializableError::new(error_type, err.to_string())
    }
}

impl From<&SupervisorError> for SerializableError {
    fn from(err: &SupervisorError) -> Self {
        let error_type = match err {
            SupervisorError::Resource(_) => "resource_error",
            SupervisorError::Launch(_) => "launch_error",
            SupervisorError::Config(_) => "configuration_error",
            SupervisorError::Io(_) => "io_error",
        };
        SerializableError::new(error_type, err.to_string())
    }
}

/// Result type for shared table operations
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

/// Result type for launches
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
