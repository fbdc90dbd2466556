use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::warn;

use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Publishes the average temperature over the configured hwmon files.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(3));
    let style = config.cpu_temp.style();
    loop {
        tick.tick().await;

        let mut readings = Vec::with_capacity(config.cpu_temp.file.len());
        for path in &config.cpu_temp.file {
            match fs::read_to_string(path).await {
                Ok(raw) => match parse_temperature(&raw) {
                    Some(temp) => readings.push(temp),
                    None => {
                        warn!(event = "cpu_temp_unparsable", file = %path);
                        readings.push(0);
                    }
                },
                Err(err) => {
                    warn!(event = "cpu_temp_unreadable", file = %path, error = %err);
                    readings.push(0);
                }
            }
        }
        if readings.is_empty() {
            continue;
        }

        let avg = readings.iter().sum::<i64>() / readings.len() as i64;
        bar.publish(SourceId::CpuTemp, span(&style, &format!("CPU: {avg}°")));
    }
}

/// hwmon reports millidegrees; a handful of drivers report plain degrees.
fn parse_temperature(raw: &str) -> Option<i64> {
    let temp: i64 = raw.trim().parse().ok()?;
    Some(if temp > 1000 { temp / 1000 } else { temp })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millidegrees_are_scaled_down() {
        assert_eq!(parse_temperature("54000\n"), Some(54));
        assert_eq!(parse_temperature("45"), Some(45));
        assert_eq!(parse_temperature("garbage"), None);
    }
}
