/*!
 * PID Supervisor - Main Entry Point
 *
 * Minimal process supervisor that provides:
 * - A shared, fixed-capacity pid table
 * - Shell command launching from an operator prompt
 * - Slot reclamation when children exit
 */

use pid_supervisor::core::errors::Result;
use pid_supervisor::core::limits::{INPUT_CHANNEL_CAPACITY, MAX_SLOTS};
use pid_supervisor::signals::ShutdownSignals;
use pid_supervisor::{
    init_tracing, spawn_stdin_reader, CommandLoop, LoopExit, ProcessLauncher, Reaper,
    SerializableError, SlotTable, SupervisorConfig,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let config = SupervisorConfig::from_env()?;
    init_tracing(config.trace_json);

    if let Err(e) = run(config).await {
        error!(error = %SerializableError::from(&e).to_json(), "Supervisor failed");
        return Err(e.into());
    }

    info!("Supervisor stopped");
    Ok(())
}

async fn run(config: SupervisorConfig) -> Result<()> {
    info!(
        segment = %config.shm_name,
        capacity = MAX_SLOTS,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        shell = %config.shell,
        "Supervisor starting"
    );

    // Installed before the segment exists, so an early interrupt still
    // reaches the teardown below
    let mut signals = ShutdownSignals::register();

    let table = Arc::new(SlotTable::<MAX_SLOTS>::create(&config.shm_name)?);

    let launcher = ProcessLauncher::new(Arc::clone(&table)).with_shell(config.shell.clone());
    let reaper = Reaper::new(Arc::clone(&table)).with_records(launcher.records());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_interval = config.poll_interval;
    let monitor = tokio::spawn(async move { reaper.run(poll_interval, shutdown_rx).await });

    let command_loop = CommandLoop::new(launcher);
    let mut lines = spawn_stdin_reader(INPUT_CHANNEL_CAPACITY)?;
    let mut stdout = tokio::io::stdout();

    let shutdown = async {
        let signal = signals.recv().await;
        info!(signal = signal.name(), "Termination requested");
    };

    let outcome = command_loop.run(&mut lines, &mut stdout, shutdown).await;
    match &outcome {
        Ok(LoopExit::EndOfInput) => info!("Operator input closed"),
        Ok(LoopExit::Interrupted) => {}
        Err(e) => warn!(error = %e, "Command loop failed"),
    }

    // Stop the monitor before tearing the table down
    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor.await {
        warn!(error = %e, "Reaper task ended abnormally");
    }
    drop(command_loop);

    match table.snapshot() {
        Ok(slots) => info!(
            slots = %serde_json::to_string(&slots).unwrap_or_default(),
            "Final table state"
        ),
        Err(e) => warn!(error = %e, "Could not read final table state"),
    }

    match Arc::try_unwrap(table) {
        Ok(table) => table.destroy()?,
        // Remaining handles tear down when the last one drops
        Err(_) => warn!("Slot table still shared at shutdown"),
    }

    outcome.map(|_| ())
}
