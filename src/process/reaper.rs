/*!
 * Reaper
 * Frees slots of children that have terminated
 *
 * Two paths clear a slot:
 * - `on_exit`: a cooperating process releases its own pid. This can not be
 *   relied on alone, because a hook registered before exec is gone once the
 *   program image is replaced.
 * - `Reaper`: the supervisor polls every tracked pid with a non-blocking
 *   wait, which also collects the zombie. SIGCHLD only wakes the poll loop;
 *   the table is never touched from signal context.
 *
 * The two paths are mutually exclusive while the monitor runs: a pid the
 * supervisor can not wait on (`ECHILD`) is treated as gone, so a process
 * that attached with `SlotTable::open` and reserved its own pid loses its
 * slot at the next sweep.
 */

use super::types::{ChildExit, LaunchRecord, ReapedChild};
use crate::core::errors::ResourceResult;
use crate::core::limits::MAX_SLOTS;
use crate::core::types::{Pid, SlotIndex};
use crate::ipc::SlotTable;
use crate::signals;
use dashmap::DashMap;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid as NixPid;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Release the slot held by `self_pid`
///
/// Meant for a process that attached to the table and is exiting. Unknown
/// pids are ignored.
pub fn on_exit<const N: usize>(
    table: &SlotTable<N>,
    self_pid: Pid,
) -> ResourceResult<Option<SlotIndex>> {
    let released = table.release_slot(self_pid)?;
    if let Some(slot) = released {
        info!(pid = self_pid, slot, "Cleaned up pid");
    }
    Ok(released)
}

/// Supervisor-side monitor for tracked children
pub struct Reaper<const N: usize = MAX_SLOTS> {
    table: Arc<SlotTable<N>>,
    records: Option<Arc<DashMap<Pid, LaunchRecord>>>,
}

impl<const N: usize> Reaper<N> {
    pub fn new(table: Arc<SlotTable<N>>) -> Self {
        Self {
            table,
            records: None,
        }
    }

    /// Share launch metadata so exits can be logged with their command
    pub fn with_records(mut self, records: Arc<DashMap<Pid, LaunchRecord>>) -> Self {
        self.records = Some(records);
        self
    }

    /// One sweep over every occupied slot
    ///
    /// The guard is held only while snapshotting and while releasing each
    /// slot, never across `waitpid`.
    pub fn reap(&self) -> ResourceResult<Vec<ReapedChild>> {
        let tracked = self.table.occupied()?;
        let mut reaped = Vec::new();

        for (slot, pid) in tracked {
            let exit = match waitpid(NixPid::from_raw(pid), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => ChildExit::Exited(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => ChildExit::Signaled(signal as i32),
                // Still running (or merely stopped/continued)
                Ok(_) => continue,
                Err(Errno::ECHILD) => ChildExit::Vanished,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    warn!(pid, error = %e, "waitpid failed");
                    continue;
                }
            };

            // Compare-and-clear: the slot may have been released, and the pid
            // reused by a newer child, since the snapshot
            if !self.table.release_at(slot, pid)? {
                continue;
            }

            self.log_exit(pid, slot, exit);
            reaped.push(ReapedChild { pid, slot, exit });
        }

        Ok(reaped)
    }

    /// Sweep at `interval`, and whenever SIGCHLD arrives, until shutdown
    ///
    /// A final sweep runs after shutdown is requested.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut child_exits = signals::child_exits();

        info!(interval_ms = interval.as_millis() as u64, "Reaper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = signals::next_child_exit(&mut child_exits) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            if let Err(e) = self.reap() {
                error!(error = %e, "Reaper sweep failed");
            }
        }

        if let Err(e) = self.reap() {
            error!(error = %e, "Final reaper sweep failed");
        }
        info!("Reaper stopped");
    }

    fn log_exit(&self, pid: Pid, slot: SlotIndex, exit: ChildExit) {
        let record = self
            .records
            .as_ref()
            .and_then(|records| records.remove(&pid))
            .map(|(_, record)| record);

        let command = record.as_ref().map(|r| r.command.as_str()).unwrap_or("");
        let launch_id = record.as_ref().map(|r| r.launch_id.as_str()).unwrap_or("");
        let runtime_ms = record
            .as_ref()
            .map(|r| r.started.elapsed().as_millis() as u64)
            .unwrap_or(0);

        if exit.exec_failed() {
            warn!(pid, slot, command, launch_id, %exit, "Command could not be executed");
        } else if exit.success() {
            info!(pid, slot, command, launch_id, runtime_ms, "Cleaned up pid");
        } else {
            warn!(pid, slot, command, launch_id, runtime_ms, %exit, "Cleaned up pid");
        }
    }
}

impl<const N: usize> Clone for Reaper<N> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            records: self.records.clone(),
        }
    }
}
