use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Publishes the wall clock once a second; the store suppresses the 59
/// unchanged publishes per minute.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(1));
    let style = config.clock.style();
    loop {
        tick.tick().await;
        let text = format_clock(&Local::now());
        bar.publish(SourceId::Clock, span(&style, &text));
    }
}

fn format_clock(now: &chrono::DateTime<Local>) -> String {
    // Padding keeps the rightmost block clear of the bar edge.
    format!("     {}  ", now.format("%a, %-d %b %Y  %k:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn clock_renders_day_month_and_24h_time() {
        let at = Local.with_ymd_and_hms(2024, 1, 9, 7, 5, 33).single().expect("valid");
        let text = format_clock(&at);
        assert!(text.contains("9 Jan 2024"));
        assert!(text.ends_with(" 7:05  "));
        assert!(!text.contains("33")); // seconds never shown
    }
}
