/*!
 * Shared test helpers
 */

#![allow(dead_code)]

use pid_supervisor::{ReapedChild, Reaper, Slot, SlotTable};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Segment name no other test uses
pub fn unique_name() -> String {
    format!("/sup-test-{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Sweep until `done` holds for the table, collecting every reaped child
pub fn reap_until<const N: usize, F>(
    reaper: &Reaper<N>,
    table: &SlotTable<N>,
    done: F,
) -> Vec<ReapedChild>
where
    F: Fn(&[Slot]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut reaped = Vec::new();

    loop {
        reaped.extend(reaper.reap().unwrap());
        if done(&table.snapshot().unwrap()) {
            return reaped;
        }
        assert!(
            Instant::now() < deadline,
            "table never reached the expected state: {:?}",
            table.snapshot().unwrap()
        );
        thread::sleep(Duration::from_millis(20));
    }
}

pub fn all_empty(slots: &[Slot]) -> bool {
    slots.iter().all(Slot::is_empty)
}
