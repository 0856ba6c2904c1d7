/*!
 * Process Launcher
 * Reserves a slot and starts a shell running the operator's command
 */

use super::types::LaunchRecord;
use crate::core::errors::{LaunchError, LaunchResult};
use crate::core::limits::{DEFAULT_SHELL, MAX_COMMAND_LEN, MAX_SLOTS};
use crate::core::types::{Pid, SlotIndex, WorkRequest};
use crate::ipc::SlotTable;
use crate::monitoring::generate_launch_id;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Starts commands and registers them in the shared table
pub struct ProcessLauncher<const N: usize = MAX_SLOTS> {
    table: Arc<SlotTable<N>>,
    shell: String,
    records: Arc<DashMap<Pid, LaunchRecord>>,
}

impl<const N: usize> ProcessLauncher<N> {
    pub fn new(table: Arc<SlotTable<N>>) -> Self {
        info!(capacity = N, "Process launcher initialized");
        Self {
            table,
            shell: DEFAULT_SHELL.to_string(),
            records: Arc::new(DashMap::new()),
        }
    }

    /// Interpret commands with a different shell
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Launch metadata shared with the reaper
    pub fn records(&self) -> Arc<DashMap<Pid, LaunchRecord>> {
        Arc::clone(&self.records)
    }

    /// Launch the command of a work request
    pub fn launch_request(&self, work: &WorkRequest) -> LaunchResult<Pid> {
        self.launch(&work.command)
    }

    /// Start `<shell> -c <command>` in a free slot and return its pid
    pub fn launch(&self, command: &str) -> LaunchResult<Pid> {
        validate_command(command)?;

        let launch_id = generate_launch_id();
        let span = info_span!("launch", launch_id = %launch_id);
        let _entered = span.enter();

        // Reserve-then-launch. Creating the process first and registering it
        // afterwards would leave a running child that no slot tracks whenever
        // the table turns out to be full, and a plain "is there room" check
        // goes stale as soon as the guard is released. Taking a pending slot
        // under the guard means capacity is owned before the process exists.
        let slot = match self.table.reserve_pending()? {
            Some(slot) => slot,
            None => {
                warn!(command, "No free slot, command rejected");
                return Err(LaunchError::NoCapacity { capacity: N });
            }
        };

        let child = match self.spawn(command) {
            Ok(child) => child,
            Err(e) => {
                if let Err(abandon) = self.table.abandon(slot) {
                    warn!(slot, error = %abandon, "Failed to free pending slot");
                }
                warn!(command, error = %e, "Launch failed");
                return Err(e);
            }
        };

        let pid = match Pid::try_from(child.id()) {
            Ok(pid) => pid,
            Err(e) => {
                self.discard(child, slot);
                return Err(LaunchError::SpawnFailed(e.to_string()));
            }
        };

        // Recorded before the slot is committed: the reaper only sees the pid
        // after commit, so it can never miss the record.
        self.records.insert(
            pid,
            LaunchRecord {
                launch_id: launch_id.clone(),
                command: command.to_string(),
                started: Instant::now(),
            },
        );

        if let Err(e) = self.table.commit(slot, pid) {
            // A child the table can not track is killed rather than leaked
            self.records.remove(&pid);
            self.discard(child, slot);
            return Err(e.into());
        }

        // The reaper waits by pid; the handle is not needed past this point
        drop(child);

        info!(pid, slot, command, "Started process");
        Ok(pid)
    }

    fn spawn(&self, command: &str) -> LaunchResult<Child> {
        Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => LaunchError::ExecFailed {
                    shell: self.shell.clone(),
                    reason: e.to_string(),
                },
                _ => LaunchError::SpawnFailed(e.to_string()),
            })
    }

    fn discard(&self, mut child: Child, slot: SlotIndex) {
        if let Err(e) = child.kill() {
            warn!(pid = child.id(), error = %e, "Failed to kill untracked child");
        }
        if let Err(e) = child.wait() {
            warn!(pid = child.id(), error = %e, "Failed to wait for untracked child");
        }
        if let Err(e) = self.table.abandon(slot) {
            debug!(slot, error = %e, "Pending slot already released");
        }
    }
}

impl<const N: usize> Clone for ProcessLauncher<N> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            shell: self.shell.clone(),
            records: Arc::clone(&self.records),
        }
    }
}

/// Reject commands the operator buffer could never have held
fn validate_command(command: &str) -> LaunchResult<()> {
    if command.trim().is_empty() {
        return Err(LaunchError::InvalidCommand("Empty command".to_string()));
    }

    if command.contains('\0') {
        return Err(LaunchError::InvalidCommand(
            "Command contains a NUL byte".to_string(),
        ));
    }

    if command.len() > MAX_COMMAND_LEN {
        return Err(LaunchError::InvalidCommand(format!(
            "Command is {} bytes, limit is {}",
            command.len(),
            MAX_COMMAND_LEN
        )));
    }

    Ok(())
}
