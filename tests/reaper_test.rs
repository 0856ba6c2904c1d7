/*!
 * Reaper Tests
 * Self-cleanup hook, polling sweeps and the async monitor loop
 */

mod common;

use common::{all_empty, unique_name};
use pid_supervisor::{on_exit, ChildExit, Pid, ProcessLauncher, Reaper, Slot, SlotTable};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[test]
fn test_on_exit_releases_own_slot() {
    let table = SlotTable::<4>::create(&unique_name()).unwrap();
    let me = std::process::id() as Pid;

    table.reserve_slot(1001).unwrap();
    table.reserve_slot(me).unwrap();

    assert_eq!(on_exit(&table, me).unwrap(), Some(1));
    assert_eq!(
        table.snapshot().unwrap(),
        vec![Slot::Occupied(1001), Slot::Empty, Slot::Empty, Slot::Empty]
    );

    // Second call finds nothing and changes nothing
    assert_eq!(on_exit(&table, me).unwrap(), None);
    assert_eq!(table.free_slots().unwrap(), 3);
}

#[test]
fn test_on_exit_through_attached_handle() {
    let name = unique_name();
    let table = SlotTable::<2>::create(&name).unwrap();
    table.reserve_slot(4242).unwrap();

    let attached = SlotTable::<2>::open(&name).unwrap();
    assert_eq!(on_exit(&attached, 4242).unwrap(), Some(0));
    assert!(all_empty(&table.snapshot().unwrap()));
}

#[test]
#[serial]
fn test_sweep_frees_slot_of_foreign_pid() {
    // pid 1 is alive but not our child: it can never be waited on, so the
    // slot is stale and gets reclaimed
    let table = Arc::new(SlotTable::<2>::create(&unique_name()).unwrap());
    table.reserve_slot(1).unwrap();

    let reaped = Reaper::new(Arc::clone(&table)).reap().unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].exit, ChildExit::Vanished);
    assert!(all_empty(&table.snapshot().unwrap()));
}

#[test]
#[serial]
fn test_sweep_evicts_self_registered_pid() {
    // A process that reserved its own pid is not the supervisor's child,
    // so the monitor can not tell it apart from a vanished one
    let name = unique_name();
    let table = Arc::new(SlotTable::<2>::create(&name).unwrap());
    let attached = SlotTable::<2>::open(&name).unwrap();
    let me = std::process::id() as Pid;
    attached.reserve_slot(1001).unwrap();
    attached.reserve_slot(me).unwrap();

    let reaped = Reaper::new(Arc::clone(&table)).reap().unwrap();
    assert_eq!(reaped.len(), 2);
    assert_eq!(reaped[1].pid, me);
    assert_eq!(reaped[1].slot, 1);
    assert_eq!(reaped[1].exit, ChildExit::Vanished);
    assert_eq!(on_exit(&attached, me).unwrap(), None);
}

#[test]
#[serial]
fn test_sweep_leaves_running_children_alone() {
    let table = Arc::new(SlotTable::<2>::create(&unique_name()).unwrap());
    let launcher = ProcessLauncher::new(Arc::clone(&table));
    let reaper = Reaper::new(Arc::clone(&table)).with_records(launcher.records());

    let pid = launcher.launch("exec sleep 30").unwrap();
    assert!(reaper.reap().unwrap().is_empty());
    assert_eq!(table.position(pid).unwrap(), Some(0));
    assert_eq!(launcher.records().len(), 1);

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGTERM,
    )
    .unwrap();
    common::reap_until(&reaper, &table, all_empty);
    assert!(launcher.records().is_empty());
}

#[tokio::test]
#[serial]
async fn test_monitor_loop_drains_table() {
    let table = Arc::new(SlotTable::<3>::create(&unique_name()).unwrap());
    let launcher = ProcessLauncher::new(Arc::clone(&table));
    let reaper = Reaper::new(Arc::clone(&table)).with_records(launcher.records());

    for _ in 0..3 {
        launcher.launch("true").unwrap();
    }
    assert_eq!(table.free_slots().unwrap(), 0);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = tokio::spawn(async move {
        reaper.run(Duration::from_millis(50), shutdown_rx).await;
    });

    let drained = tokio::time::timeout(Duration::from_secs(10), async {
        while table.free_slots().unwrap() < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "monitor never freed the slots");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), monitor)
        .await
        .expect("monitor did not stop")
        .unwrap();

    assert!(launcher.records().is_empty());
}
