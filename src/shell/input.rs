/*!
 * Operator Input
 * Blocking stdin reader feeding the async command loop
 */

use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Read stdin lines on a dedicated thread
///
/// The thread is detached: a read blocked at shutdown does not hold the
/// process open. The channel closes on end of input.
pub fn spawn_stdin_reader(capacity: usize) -> io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(capacity);

    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read operator input");
                        break;
                    }
                }
            }
            debug!("Operator input closed");
        })?;

    Ok(rx)
}
