//! Maps OS signals onto the composer's pause flag and process termination.
//! SIGUSR1/SIGUSR2 match what the emitted protocol header advertises as
//! stop/cont signals.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use crate::bar::Bar;

/// Runs until a termination signal arrives, then returns; the caller exits
/// the process immediately (no draining, per the bar contract).
pub async fn run(bar: Arc<Bar>) -> anyhow::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut int = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = usr1.recv() => {
                info!(event = "output_paused");
                bar.pause();
            }
            _ = usr2.recv() => {
                info!(event = "output_resumed");
                bar.resume();
            }
            _ = term.recv() => return Ok(()),
            _ = quit.recv() => return Ok(()),
            _ = int.recv() => return Ok(()),
        }
    }
}
