/*!
 * Signal Tests
 * Termination signals are captured from registration onward
 */

use nix::sys::signal::{raise, Signal};
use pid_supervisor::signals::{Shutdown, ShutdownSignals};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::time::Duration;

async fn recv_within(signals: &mut ShutdownSignals) -> Shutdown {
    tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .expect("registered signal was not delivered")
}

#[tokio::test]
#[serial]
async fn test_interrupt_raised_before_recv_is_kept() {
    let mut signals = ShutdownSignals::register();

    // Would terminate the test process if the handler were not installed yet
    raise(Signal::SIGINT).unwrap();

    let received = recv_within(&mut signals).await;
    assert_eq!(received, Shutdown::Interrupt);
    assert_eq!(received.name(), "SIGINT");
}

#[tokio::test]
#[serial]
async fn test_terminate_raised_before_recv_is_kept() {
    let mut signals = ShutdownSignals::register();

    raise(Signal::SIGTERM).unwrap();

    let received = recv_within(&mut signals).await;
    assert_eq!(received, Shutdown::Terminate);
    assert_eq!(received.name(), "SIGTERM");
}
