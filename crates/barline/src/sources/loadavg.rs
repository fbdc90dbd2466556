use std::sync::Arc;
use std::time::Duration;

use sysinfo::System;

use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Publishes the one-minute load average.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(3));
    let style = config.la.style();
    loop {
        tick.tick().await;
        let load = System::load_average();
        let text = format!("LA:{:.2}", load.one);
        bar.publish(SourceId::LoadAvg, span(&style, &text));
    }
}
