//! Snapshot store, dirty channel and the composer.
//!
//! Producers publish fully-rendered strings into per-source slots; a bounded
//! wake-up channel coalesces change notifications; the composer is the sole
//! consumer and rebuilds the entire line from the store on every wake-up, so
//! a dropped signal never loses data (level-triggered, not edge-triggered).

use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error};

use barline_core::pango::span;
use barline_core::protocol::{Header, I3Block};
use barline_core::route::{CLOCK_NAME, VOLUME_NAME};
use barline_core::windows::WindowCounts;
use barline_core::SourceId;

use crate::config::{Config, Separator};

/// Wake-up slots to buffer; overflow is coalesced away by `try_send`.
pub const DIRTY_CAPACITY: usize = 8;

/// The snapshot store plus the composer-facing control surface.
pub struct Bar {
    readings: [RwLock<String>; SourceId::COUNT],
    dirty_tx: mpsc::Sender<()>,
    paused: AtomicBool,
}

impl Bar {
    pub fn new(dirty_tx: mpsc::Sender<()>) -> Self {
        Bar {
            readings: std::array::from_fn(|_| RwLock::new(String::new())),
            dirty_tx,
            paused: AtomicBool::new(false),
        }
    }

    /// Publishes a fully-built rendering for `source`. Fires the dirty
    /// channel only when the text actually changed; a full channel means a
    /// composition is already pending and the signal can be dropped.
    pub fn publish(&self, source: SourceId, text: String) {
        let changed = {
            let mut slot = self.readings[source.index()]
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *slot == text {
                false
            } else {
                *slot = text;
                true
            }
        };
        if changed {
            self.mark_dirty();
        }
    }

    /// Sets a placeholder without waking the composer; used before the
    /// producers start so the first emission is never half-empty.
    pub fn preset(&self, source: SourceId, text: String) {
        let mut slot = self.readings[source.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = text;
    }

    /// Requests a composition pass without changing any reading (window
    /// inventory changes re-style existing blocks).
    pub fn mark_dirty(&self) {
        let _ = self.dirty_tx.try_send(());
    }

    pub fn snapshot(&self) -> [String; SourceId::COUNT] {
        std::array::from_fn(|i| {
            self.readings[i]
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes output and forces an immediate re-emission.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.mark_dirty();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Prints the protocol handshake: header object, then the opening of the
/// infinite array with one empty update. The array is never closed; the bar
/// terminates us, not the other way around.
pub fn emit_header() {
    let header = Header {
        version: 1,
        stop_signal: libc::SIGUSR1,
        cont_signal: libc::SIGUSR2,
        click_events: true,
    };
    let mut out = io::stdout().lock();
    match serde_json::to_string(&header) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
        }
        Err(err) => error!(event = "header_encode_failed", error = %err),
    }
    let _ = writeln!(out, "[ [],");
    let _ = out.flush();
}

/// Drains wake-ups and emits one status line per pass. Single consumer by
/// construction, so lines can never interleave.
pub async fn run_composer(
    bar: Arc<Bar>,
    config: Arc<Config>,
    windows: Arc<WindowCounts>,
    mut dirty_rx: mpsc::Receiver<()>,
) {
    while dirty_rx.recv().await.is_some() {
        if bar.is_paused() {
            debug!(event = "compose_skipped_paused");
            continue;
        }
        let blocks = compose(&config, &bar.snapshot(), &windows);
        if blocks.is_empty() {
            continue;
        }
        match serde_json::to_string(&blocks) {
            Ok(line) => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{line},");
                let _ = out.flush();
            }
            Err(err) => error!(event = "line_encode_failed", error = %err),
        }
    }
}

/// Builds the ordered block list from the current readings. Pure so the
/// emission order and styling are testable without the event loop.
pub fn compose(
    config: &Config,
    readings: &[String; SourceId::COUNT],
    windows: &WindowCounts,
) -> Vec<I3Block> {
    let mut blocks = Vec::new();

    if config.app_buttons.enabled {
        for app in &config.apps {
            let mut block = I3Block::pango(app.full_text.clone());
            block.color = app.color.clone().filter(|c| !c.is_empty());
            block.background = app.background.clone().filter(|c| !c.is_empty());
            block.name = non_empty(&app.name);
            block.instance = non_empty(&app.instance);
            block.separator = app.separator;
            block.separator_block_width = app.separator_block_width;
            block.border = if windows.exists(&app.class, &app.instance) {
                app.border_active.clone()
            } else {
                app.border.clone()
            };
            block.border_top = 1;
            block.border_right = 1;
            block.border_bottom = 1;
            block.border_left = 1;
            blocks.push(block);
        }
    }

    let mut push = |enabled: bool,
                    source: SourceId,
                    color: &str,
                    background: &str,
                    separator: &Separator,
                    name: Option<&str>| {
        if !enabled {
            return;
        }
        let reading = &readings[source.index()];
        if reading.is_empty() {
            return;
        }
        let mut block = I3Block::pango(wrap_separators(separator, reading));
        block.color = non_empty(color);
        block.background = non_empty(background);
        block.name = name.map(str::to_string);
        blocks.push(block);
    };

    push(
        config.cpu_temp.enabled,
        SourceId::CpuTemp,
        &config.cpu_temp.color,
        &config.cpu_temp.background,
        &config.cpu_temp.separator,
        None,
    );
    push(
        config.mem.enabled,
        SourceId::Memory,
        &config.mem.color,
        &config.mem.background,
        &config.mem.separator,
        None,
    );
    push(
        config.la.enabled,
        SourceId::LoadAvg,
        &config.la.color,
        &config.la.background,
        &config.la.separator,
        None,
    );
    push(
        config.net_if.enabled,
        SourceId::NetIf,
        &config.net_if.color,
        &config.net_if.background,
        &config.net_if.separator,
        None,
    );
    push(
        config.vpn.enabled,
        SourceId::Vpn,
        &config.vpn.color,
        &config.vpn.background,
        &config.vpn.separator,
        None,
    );
    push(
        config.cmd_run.enabled,
        SourceId::Command,
        &config.cmd_run.color,
        &config.cmd_run.background,
        &config.cmd_run.separator,
        None,
    );
    push(
        config.battery.enabled,
        SourceId::Battery,
        &config.battery.color,
        &config.battery.background,
        &config.battery.separator,
        None,
    );
    push(
        config.volume.enabled,
        SourceId::Volume,
        &config.volume.color,
        &config.volume.background,
        &config.volume.separator,
        Some(VOLUME_NAME),
    );
    push(
        config.clock.enabled,
        SourceId::Clock,
        &config.clock.color,
        &config.clock.background,
        &config.clock.separator,
        Some(CLOCK_NAME),
    );

    blocks
}

fn wrap_separators(separator: &Separator, reading: &str) -> String {
    let mut text = String::new();
    if separator.left.enabled {
        text.push_str(&span(&separator.left.style(), &separator.left.symbol));
    }
    text.push_str(reading);
    if separator.right.enabled {
        text.push_str(&span(&separator.right.style(), &separator.right.symbol));
    }
    text
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barline_core::route::AppEntry;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.clock.enabled = true;
        config.mem.enabled = true;
        config
    }

    fn bar_with_channel(capacity: usize) -> (Bar, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Bar::new(tx), rx)
    }

    #[test]
    fn coalesced_publishes_compose_to_the_last_value_only() {
        let (bar, mut rx) = bar_with_channel(DIRTY_CAPACITY);
        let config = test_config();
        let windows = WindowCounts::new();

        bar.publish(SourceId::Clock, "10:00".to_string());
        bar.publish(SourceId::Clock, "10:01".to_string());

        // Drain whatever queued before composing, as the composer would.
        let mut signals = 0;
        while rx.try_recv().is_ok() {
            signals += 1;
        }
        assert!(signals >= 1);

        let line = serde_json::to_string(&compose(&config, &bar.snapshot(), &windows))
            .expect("serialize");
        assert_eq!(line.matches("10:01").count(), 1);
        assert!(!line.contains("10:00"));
    }

    #[test]
    fn publishing_an_unchanged_value_stays_silent() {
        let (bar, mut rx) = bar_with_channel(DIRTY_CAPACITY);
        bar.publish(SourceId::Memory, "M:40%".to_string());
        assert!(rx.try_recv().is_ok());
        bar.publish(SourceId::Memory, "M:40%".to_string());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dirty_signals_coalesce_when_the_channel_is_full() {
        let (bar, mut rx) = bar_with_channel(1);
        for i in 0..10 {
            bar.publish(SourceId::Clock, format!("10:{i:02}"));
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        // The store still holds the newest value even though signals dropped.
        assert_eq!(bar.snapshot()[SourceId::Clock.index()], "10:09");
    }

    #[test]
    fn preset_does_not_wake_the_composer() {
        let (bar, mut rx) = bar_with_channel(DIRTY_CAPACITY);
        bar.preset(SourceId::Battery, "⚡ ??% •".to_string());
        assert!(rx.try_recv().is_err());
        assert_eq!(bar.snapshot()[SourceId::Battery.index()], "⚡ ??% •");
    }

    #[test]
    fn resume_forces_a_composition_pass() {
        let (bar, mut rx) = bar_with_channel(DIRTY_CAPACITY);
        bar.pause();
        assert!(bar.is_paused());
        bar.resume();
        assert!(!bar.is_paused());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn compose_orders_sources_and_skips_disabled_and_empty() {
        let (bar, _rx) = bar_with_channel(DIRTY_CAPACITY);
        let config = test_config();
        let windows = WindowCounts::new();

        bar.publish(SourceId::Memory, "M:40% SHM:100M".to_string());
        bar.publish(SourceId::Clock, "Thu, 1 Jan 1970   1:00".to_string());
        // Load average has a reading but is not enabled.
        bar.publish(SourceId::LoadAvg, "LA:0.42".to_string());

        let blocks = compose(&config, &bar.snapshot(), &windows);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].full_text.contains("M:40%"));
        assert!(blocks[1].full_text.contains("1 Jan 1970"));
        assert_eq!(blocks[1].name.as_deref(), Some(CLOCK_NAME));
    }

    #[test]
    fn app_button_border_follows_window_inventory() {
        let mut config = Config::default();
        config.app_buttons.enabled = true;
        config.apps.push(AppEntry {
            full_text: "term".to_string(),
            name: "term".to_string(),
            class: "^URxvt$".to_string(),
            border: Some("#444444".to_string()),
            border_active: Some("#00ff00".to_string()),
            ..AppEntry::default()
        });
        let (bar, _rx) = bar_with_channel(DIRTY_CAPACITY);
        let windows = WindowCounts::new();

        let blocks = compose(&config, &bar.snapshot(), &windows);
        assert_eq!(blocks[0].border.as_deref(), Some("#444444"));

        windows.appeared("URxvt", "urxvt");
        let blocks = compose(&config, &bar.snapshot(), &windows);
        assert_eq!(blocks[0].border.as_deref(), Some("#00ff00"));
        assert_eq!(blocks[0].border_top, 1);
    }

    #[test]
    fn separators_wrap_the_reading_when_enabled() {
        let mut config = test_config();
        config.mem.separator.left.enabled = true;
        config.mem.separator.left.symbol = "◀".to_string();
        let (bar, _rx) = bar_with_channel(DIRTY_CAPACITY);
        bar.publish(SourceId::Memory, "M:40%".to_string());

        let blocks = compose(&config, &bar.snapshot(), &WindowCounts::new());
        assert!(blocks[0].full_text.starts_with("<span"));
        assert!(blocks[0].full_text.contains("◀"));
        assert!(blocks[0].full_text.contains("M:40%"));
    }
}
