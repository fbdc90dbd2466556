//! Spawn queue, detached launcher and the zombie reaper.
//!
//! Launched programs outlive us: each child gets its own session, null
//! stdio and no controlling terminal. Children are never waited on at
//! launch; the reaper reclaims whatever exits, whoever spawned it.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Minimum gap between launches; absorbs wheel-scroll click storms.
pub const LAUNCH_DELAY: Duration = Duration::from_millis(25);

/// Reap cadence. Zombies hold a process-table slot but nothing else, so a
/// slow sweep is fine.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Dequeues argv requests and launches them in submission order, never
/// waiting for completion.
pub async fn run_launcher(rx: mpsc::Receiver<Vec<String>>) {
    run_launcher_with(rx, |argv| {
        if let Err(err) = launch_detached(argv) {
            warn!(event = "spawn_failed", cmd = %argv[0], error = %err);
        }
    })
    .await;
}

async fn run_launcher_with(
    mut rx: mpsc::Receiver<Vec<String>>,
    mut launch: impl FnMut(&[String]),
) {
    while let Some(argv) = rx.recv().await {
        if argv.is_empty() {
            continue;
        }
        tokio::time::sleep(LAUNCH_DELAY).await;
        launch(&argv);
    }
}

fn launch_detached(argv: &[String]) -> io::Result<()> {
    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(home) = std::env::var_os("HOME") {
        command.current_dir(home);
    }
    // New session: no controlling terminal, and our exit never signals it.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    command.spawn().map(drop)
}

/// Periodically reclaims exited children. Runs for the process lifetime.
pub async fn run_reaper() {
    let mut tick = tokio::time::interval(REAP_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let reaped = reap_exited();
        if reaped > 0 {
            debug!(event = "children_reaped", count = reaped);
        }
    }
}

/// Drains every already-exited child without blocking. Both "children still
/// running" (pid 0) and "no children at all" (ECHILD) end the sweep
/// normally.
fn reap_exited() -> usize {
    let mut reaped = 0;
    loop {
        let pid = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
        if pid <= 0 {
            return reaped;
        }
        reaped += 1;
    }
}
