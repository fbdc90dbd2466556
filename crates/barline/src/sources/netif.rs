use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::warn;

use barline_core::pango::{colored, span};
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::{Config, NetIfConfig};

/// Publishes one `name:glyph` segment per monitored interface, read from
/// the kernel's `operstate` files.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(3));
    let style = config.net_if.style();
    loop {
        tick.tick().await;

        let mut segments = Vec::with_capacity(config.net_if.interfaces.len());
        for entry in &config.net_if.interfaces {
            let path = format!("{}/operstate", entry.dir);
            let glyph = match fs::read_to_string(&path).await {
                Ok(state) => state_glyph(state.trim(), &config.net_if),
                Err(err) => {
                    warn!(event = "netif_unreadable", file = %path, error = %err);
                    "?".to_string()
                }
            };
            segments.push(format!("{}:{}", entry.name, glyph));
        }

        bar.publish(SourceId::NetIf, span(&style, &segments.join(" ")));
    }
}

fn state_glyph(operstate: &str, config: &NetIfConfig) -> String {
    match operstate {
        "up" => colored(&config.up_color, "⍋"),
        "down" => colored(&config.down_color, "⍒"),
        _ => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operstates_map_to_glyphs() {
        let mut config = NetIfConfig::default();
        config.up_color = "#00ff00".to_string();
        assert_eq!(state_glyph("up", &config), "<span foreground=\"#00ff00\">⍋</span>");
        assert_eq!(state_glyph("down", &config), "⍒");
        assert_eq!(state_glyph("unknown", &config), "?");
        assert_eq!(state_glyph("dormant", &config), "?");
    }
}
