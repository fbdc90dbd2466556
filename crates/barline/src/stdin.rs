//! Click Reader: consumes the bar host's event stream on stdin and routes
//! each event. Producers are never involved; a slow dispatch can only ever
//! delay other clicks.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use barline_core::protocol::{sanitize_click_line, ClickEvent};
use barline_core::route::{route, Action, Routing};

use crate::config::Config;

pub async fn run(
    config: Arc<Config>,
    spawn_tx: mpsc::Sender<Vec<String>>,
    audio_tx: std::sync::mpsc::Sender<ClickEvent>,
) {
    let routing = config.routing();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // The host opens the stream with a non-JSON handshake line; exactly one
    // parse failure passes without logging.
    let mut garbage_tolerated = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(event = "stdin_closed");
                return;
            }
            Err(err) => {
                if garbage_tolerated {
                    warn!(event = "stdin_read_failed", error = %err);
                }
                return;
            }
        };

        let Some(json) = sanitize_click_line(&line) else {
            debug!(event = "stdin_no_object", line = %line);
            continue;
        };

        let event: ClickEvent = match serde_json::from_str(json) {
            Ok(event) => event,
            Err(err) => {
                if garbage_tolerated {
                    warn!(event = "click_parse_failed", error = %err, line = %json);
                }
                garbage_tolerated = true;
                continue;
            }
        };
        garbage_tolerated = true;

        dispatch(event, &routing, &spawn_tx, &audio_tx).await;
    }
}

async fn dispatch(
    event: ClickEvent,
    routing: &Routing,
    spawn_tx: &mpsc::Sender<Vec<String>>,
    audio_tx: &std::sync::mpsc::Sender<ClickEvent>,
) {
    match route(&event, routing) {
        Some(Action::Spawn(argv)) => {
            if spawn_tx.send(argv).await.is_err() {
                warn!(event = "spawn_queue_closed");
            }
        }
        Some(Action::VolumeClick) => {
            if audio_tx.send(event).is_err() {
                warn!(event = "audio_handler_gone");
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barline_core::route::{AppEntry, ClickAction, ClockClicks};

    fn routing() -> Routing {
        Routing {
            clock: ClockClicks {
                left_click: ClickAction {
                    enabled: true,
                    cmd: vec!["gsimplecal".to_string()],
                },
                right_click: ClickAction::default(),
            },
            volume_enabled: true,
            app_buttons_enabled: true,
            apps: vec![AppEntry {
                name: "term".to_string(),
                cmd: "xterm".to_string(),
                ..AppEntry::default()
            }],
        }
    }

    #[tokio::test]
    async fn clock_click_lands_on_the_spawn_queue() {
        let (spawn_tx, mut spawn_rx) = mpsc::channel(4);
        let (audio_tx, _audio_rx) = std::sync::mpsc::channel();
        let event: ClickEvent =
            serde_json::from_str(r#"{"name":"wallclock","button":1}"#).expect("parse");

        dispatch(event, &routing(), &spawn_tx, &audio_tx).await;
        assert_eq!(spawn_rx.try_recv().expect("queued"), vec!["gsimplecal"]);
    }

    #[tokio::test]
    async fn volume_click_is_forwarded_untouched() {
        let (spawn_tx, mut spawn_rx) = mpsc::channel(4);
        let (audio_tx, audio_rx) = std::sync::mpsc::channel();
        let event: ClickEvent =
            serde_json::from_str(r#"{"name":"simple-volume-pa","button":4,"x":12}"#)
                .expect("parse");

        dispatch(event.clone(), &routing(), &spawn_tx, &audio_tx).await;
        assert_eq!(audio_rx.try_recv().expect("forwarded"), event);
        assert!(spawn_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unmatched_event_goes_nowhere() {
        let (spawn_tx, mut spawn_rx) = mpsc::channel(4);
        let (audio_tx, audio_rx) = std::sync::mpsc::channel();
        let event: ClickEvent =
            serde_json::from_str(r#"{"name":"nobody","button":2}"#).expect("parse");

        dispatch(event, &routing(), &spawn_tx, &audio_tx).await;
        assert!(spawn_rx.try_recv().is_err());
        assert!(audio_rx.try_recv().is_err());
    }
}
