//! Audio Subsystem: keeps a volume client bound to a restart-prone daemon.
//!
//! Two worker threads share one client slot. The update thread drives the
//! link state machine (Disconnected → Connecting → Connected →
//! Reinitializing → Connecting) and republishes the volume reading on every
//! daemon push. The click thread services wheel and right-click events from
//! the Click Reader. Whichever thread loses its client reinitializes the
//! daemon; a generation counter stops the other thread from tearing down
//! the freshly restarted daemon right after.

use std::process::Command;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use barline_core::pango::span;
use barline_core::protocol::ClickEvent;
use barline_core::volume::step_volume;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::{Config, VolumeConfig};
use crate::pulse::{PulseClient, PulseError};

/// Poll cadence on a silent update stream; a dead server is noticed within
/// one period.
const LIVENESS_POLL: Duration = Duration::from_secs(5);
/// How often and how many times to re-check a killed daemon for exit.
const EXIT_WAIT: Duration = Duration::from_millis(300);
const EXIT_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("unable to kill audio daemon: {0}")]
    KillFailed(String),
    #[error("timeout waiting for audio daemon to exit")]
    ExitTimeout,
    #[error("unable to start audio daemon: {0}")]
    StartFailed(String),
    #[error(transparent)]
    Client(#[from] PulseError),
}

/// Launches both worker threads. Returns immediately; the subsystem fails
/// in isolation and never takes the process down.
pub fn start(
    config: Arc<Config>,
    bar: Arc<Bar>,
    spawn_tx: mpsc::Sender<Vec<String>>,
    click_rx: Receiver<ClickEvent>,
) {
    let shared = Arc::new(AudioShared {
        config,
        bar,
        spawn_tx,
        client: Mutex::new(ClientSlot {
            generation: 0,
            client: None,
        }),
    });

    let updates = Arc::clone(&shared);
    if let Err(err) = thread::Builder::new()
        .name("audio-updates".to_string())
        .spawn(move || updates.run_updates())
    {
        error!(event = "audio_thread_failed", error = %err);
        return;
    }
    if let Err(err) = thread::Builder::new()
        .name("audio-clicks".to_string())
        .spawn(move || shared.run_clicks(click_rx))
    {
        error!(event = "audio_thread_failed", error = %err);
    }
}

struct ClientSlot {
    generation: u64,
    client: Option<Arc<PulseClient>>,
}

struct AudioShared {
    config: Arc<Config>,
    bar: Arc<Bar>,
    spawn_tx: mpsc::Sender<Vec<String>>,
    client: Mutex<ClientSlot>,
}

enum Link {
    Disconnected,
    Connecting,
    Reinitializing,
    Connected(u64, Arc<PulseClient>, Receiver<()>),
    Failed,
}

impl AudioShared {
    fn run_updates(self: Arc<Self>) {
        let mut link = Link::Disconnected;
        let mut seen_generation = 0;
        loop {
            link = match link {
                Link::Disconnected => Link::Connecting,

                Link::Connecting => match self.connect(seen_generation) {
                    Ok((generation, client)) => {
                        let updates = client.updates();
                        Link::Connected(generation, client, updates)
                    }
                    Err(err) => {
                        warn!(event = "audio_connect_failed", error = %err);
                        Link::Reinitializing
                    }
                },

                Link::Reinitializing => match self.reinit(seen_generation) {
                    Ok((generation, client)) => {
                        let updates = client.updates();
                        Link::Connected(generation, client, updates)
                    }
                    Err(err) => {
                        error!(event = "audio_reinit_failed", error = %err);
                        Link::Failed
                    }
                },

                Link::Connected(generation, client, updates) => {
                    seen_generation = generation;
                    info!(event = "audio_connected", generation);
                    self.follow_updates(&client, updates);
                    Link::Reinitializing
                }

                // The subsystem stops emitting updates but the process
                // lives on.
                Link::Failed => return,
            };
        }
    }

    /// Publishes the current volume, then republishes on every daemon push.
    /// Returns when the link is no longer usable.
    fn follow_updates(&self, client: &PulseClient, updates: Receiver<()>) {
        match client.volume_percent() {
            Ok(percent) => self.publish_volume(percent),
            Err(err) => {
                warn!(event = "audio_volume_read_failed", error = %err);
                return;
            }
        }

        loop {
            match updates.recv_timeout(LIVENESS_POLL) {
                Ok(()) => match client.volume_percent() {
                    Ok(percent) => self.publish_volume(percent),
                    Err(err) => {
                        warn!(event = "audio_volume_read_failed", error = %err);
                        return;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    if !client.is_alive() {
                        warn!(event = "audio_stream_dead");
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(event = "audio_stream_closed");
                    return;
                }
            }
        }
    }

    fn run_clicks(self: Arc<Self>, click_rx: Receiver<ClickEvent>) {
        let control = &self.config.volume.control;
        for event in click_rx.iter() {
            if event.button == 3 {
                if control.right_click_cmd.is_empty() {
                    continue;
                }
                if self.spawn_tx.try_send(control.right_click_cmd.clone()).is_err() {
                    warn!(event = "spawn_queue_full_or_closed");
                }
                continue;
            }
            self.adjust(event.button);
        }
    }

    /// Wheel adjustment: read, step, clamp, write. A read failure gets one
    /// reinitialization attempt before the click is given up on.
    fn adjust(&self, button: u8) {
        let control = &self.config.volume.control;
        let (generation, client) = match self.current() {
            Some(current) => current,
            None => match self.reinit(0) {
                Ok(current) => current,
                Err(err) => {
                    warn!(event = "audio_adjust_failed", error = %err);
                    return;
                }
            },
        };

        let percent = match client.volume_percent() {
            Ok(percent) => Ok(percent),
            Err(_) => match self.reinit(generation) {
                Ok((_, client)) => client.volume_percent(),
                Err(err) => {
                    warn!(event = "audio_adjust_failed", error = %err);
                    return;
                }
            },
        };
        let percent = match percent {
            Ok(percent) => percent,
            Err(err) => {
                warn!(event = "audio_volume_read_failed", error = %err);
                return;
            }
        };

        let Some(target) = step_volume(percent, button, control) else {
            return;
        };
        if let Err(err) = self.client_for_write().and_then(|client| {
            client.set_volume_percent(target).map_err(AudioError::from)
        }) {
            warn!(event = "audio_volume_set_failed", error = %err);
        }
    }

    fn publish_volume(&self, percent: u32) {
        self.bar
            .publish(SourceId::Volume, render_volume(&self.config.volume, percent));
    }

    fn current(&self) -> Option<(u64, Arc<PulseClient>)> {
        let slot = self.client.lock();
        slot.client
            .as_ref()
            .map(|client| (slot.generation, Arc::clone(client)))
    }

    fn client_for_write(&self) -> Result<Arc<PulseClient>, AudioError> {
        self.current()
            .map(|(_, client)| client)
            .ok_or(AudioError::Client(PulseError::NoSink))
    }

    /// Plain connect, reusing a newer live client if the other thread
    /// already replaced the slot.
    fn connect(&self, seen_generation: u64) -> Result<(u64, Arc<PulseClient>), AudioError> {
        let mut slot = self.client.lock();
        if slot.generation != seen_generation {
            if let Some(client) = &slot.client {
                if client.is_alive() {
                    return Ok((slot.generation, Arc::clone(client)));
                }
            }
        }
        let client = Arc::new(PulseClient::connect()?);
        slot.generation += 1;
        slot.client = Some(Arc::clone(&client));
        Ok((slot.generation, client))
    }

    /// Full recovery: restart the daemon, then reconnect. Skipped when a
    /// newer live client already exists.
    fn reinit(&self, seen_generation: u64) -> Result<(u64, Arc<PulseClient>), AudioError> {
        let mut slot = self.client.lock();
        if slot.generation != seen_generation {
            if let Some(client) = &slot.client {
                if client.is_alive() {
                    return Ok((slot.generation, Arc::clone(client)));
                }
            }
        }
        slot.client = None;
        daemon_reinit(&self.config.volume)?;
        let client = Arc::new(PulseClient::connect()?);
        slot.generation += 1;
        slot.client = Some(Arc::clone(&client));
        Ok((slot.generation, client))
    }
}

/// Restarts the audio daemon: a running-but-unresponsive instance is killed
/// gracefully and polled for exit a bounded number of times, then a fresh
/// one is started with the configured logout policy.
fn daemon_reinit(config: &VolumeConfig) -> Result<(), AudioError> {
    if daemon_running() {
        info!(event = "audio_daemon_unresponsive_killing");
        let status = Command::new("pulseaudio").arg("--kill").status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => return Err(AudioError::KillFailed(status.to_string())),
            Err(err) => return Err(AudioError::KillFailed(err.to_string())),
        }
        let mut attempts = 0;
        while daemon_running() {
            if attempts >= EXIT_RETRIES {
                return Err(AudioError::ExitTimeout);
            }
            attempts += 1;
            debug!(event = "audio_daemon_exit_wait", attempt = attempts);
            thread::sleep(EXIT_WAIT);
        }
    }

    let args = relaunch_args(config.dont_exit_on_login);
    match Command::new("pulseaudio").args(args).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(AudioError::StartFailed(status.to_string())),
        Err(err) => Err(AudioError::StartFailed(err.to_string())),
    }
}

fn daemon_running() -> bool {
    Command::new("pulseaudio")
        .arg("--check")
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// A negative idle time pins the daemon for the whole session; zero lets it
/// exit with the login that started it.
fn relaunch_args(dont_exit_on_login: bool) -> [&'static str; 2] {
    if dont_exit_on_login {
        ["--exit-idle-time=-1", "--start"]
    } else {
        ["--exit-idle-time=0", "--start"]
    }
}

fn render_volume(config: &VolumeConfig, percent: u32) -> String {
    let mut text = span(&config.symbol_style(), &config.symbol);
    text.push_str(&span(&config.style(), &format!(":{percent}%")));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaunch_policy_flag_follows_config() {
        assert_eq!(relaunch_args(true), ["--exit-idle-time=-1", "--start"]);
        assert_eq!(relaunch_args(false), ["--exit-idle-time=0", "--start"]);
    }

    #[test]
    fn volume_reading_renders_symbol_and_percent() {
        let config = VolumeConfig {
            symbol: "🔊".to_string(),
            color: "#ffffff".to_string(),
            ..VolumeConfig::default()
        };
        let text = render_volume(&config, 42);
        assert!(text.contains("🔊"));
        assert!(text.contains(":42%"));
    }
}
