//! Click dispatch: decides what a pointer event from the bar host should do
//! before anything is enqueued, so precedence is testable in isolation.

use serde::Deserialize;

use crate::protocol::ClickEvent;

/// Block name the clock producer publishes under.
pub const CLOCK_NAME: &str = "wallclock";
/// Block name the volume producer publishes under.
pub const VOLUME_NAME: &str = "simple-volume-pa";

/// A configured click-to-run command for a fixed-name block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickAction {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cmd: Vec<String>,
}

/// Pointer actions configured for the clock block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClockClicks {
    #[serde(default)]
    pub left_click: ClickAction,
    #[serde(default)]
    pub right_click: ClickAction,
}

/// One configured launcher button. `name`/`instance` select which click
/// events it answers to; `class`/`instance` drive the window-inventory
/// border highlight when the button is rendered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppEntry {
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub border_active: Option<String>,
    #[serde(default)]
    pub separator: bool,
    #[serde(default)]
    pub separator_block_width: u32,
}

impl AppEntry {
    fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len());
        argv.push(self.cmd.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Everything the router needs to know about the configuration.
#[derive(Debug, Clone, Default)]
pub struct Routing {
    pub clock: ClockClicks,
    pub volume_enabled: bool,
    pub app_buttons_enabled: bool,
    pub apps: Vec<AppEntry>,
}

/// What a click event resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Enqueue this argv on the spawn queue.
    Spawn(Vec<String>),
    /// Forward the event to the audio subsystem's click handler.
    VolumeClick,
}

/// Resolves a click event against the configuration.
///
/// Precedence: the clock and volume names are claimed outright (a click on
/// them never falls through to the launch table, even when no action is
/// configured). Launch entries match by (name, instance) pair first, then by
/// name alone, then by instance alone; within a tier the first entry in
/// config order wins, and at most one entry fires per event.
pub fn route(event: &ClickEvent, routing: &Routing) -> Option<Action> {
    if event.name == CLOCK_NAME {
        let action = match event.button {
            1 => &routing.clock.left_click,
            3 => &routing.clock.right_click,
            _ => return None,
        };
        if action.enabled && !action.cmd.is_empty() {
            return Some(Action::Spawn(action.cmd.clone()));
        }
        return None;
    }

    if event.name == VOLUME_NAME {
        if routing.volume_enabled {
            return Some(Action::VolumeClick);
        }
        return None;
    }

    if !routing.app_buttons_enabled {
        return None;
    }

    // Pair-configured entries only ever match as a pair; single-keyed
    // entries make up the lower tiers.
    let pair = routing.apps.iter().find(|app| {
        !app.name.is_empty()
            && !app.instance.is_empty()
            && app.name == event.name
            && app.instance == event.instance
    });
    let by_name = || {
        routing
            .apps
            .iter()
            .find(|app| !app.name.is_empty() && app.instance.is_empty() && app.name == event.name)
    };
    let by_instance = || {
        routing.apps.iter().find(|app| {
            app.name.is_empty() && !app.instance.is_empty() && app.instance == event.instance
        })
    };

    pair.or_else(by_name)
        .or_else(by_instance)
        .map(|app| Action::Spawn(app.argv()))
}
