use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use starship_battery::units::ratio::percent;
use starship_battery::{Manager, State};
use tokio::fs;
use tracing::warn;

use barline_core::battery::{charge_band, BatteryState, ChargeBand};
use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::{BatteryConfig, Config};

/// Publishes charge and state for every battery, either from configured
/// sysfs capacity files or from the power-supply enumeration.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(5));
    let manager = if config.battery.use_sysfs {
        None
    } else {
        match Manager::new() {
            Ok(manager) => Some(manager),
            Err(err) => {
                warn!(event = "battery_manager_failed", error = %err);
                return;
            }
        }
    };

    loop {
        tick.tick().await;

        let cells = if config.battery.use_sysfs {
            read_sysfs_cells(&config.battery).await
        } else {
            read_managed_cells(manager.as_ref())
        };

        // An empty read keeps the previous reading on screen rather than
        // blanking the block during a transient failure.
        let text = render_batteries(&config.battery, &cells);
        if !text.is_empty() {
            bar.publish(SourceId::Battery, text);
        }
    }
}

async fn read_sysfs_cells(config: &BatteryConfig) -> Vec<(i64, BatteryState)> {
    let mut cells = Vec::new();
    for file in &config.sysfs_files {
        let charge = match fs::read_to_string(file).await {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(charge) => charge,
                Err(_) => {
                    warn!(event = "battery_capacity_unparsable", file = %file);
                    continue;
                }
            },
            Err(err) => {
                warn!(event = "battery_capacity_unreadable", file = %file, error = %err);
                continue;
            }
        };

        let status_path = Path::new(file)
            .parent()
            .map(|dir| dir.join("status"))
            .unwrap_or_default();
        let state = match fs::read_to_string(&status_path).await {
            Ok(raw) => BatteryState::from_sysfs(raw.trim()),
            Err(_) => BatteryState::Unknown,
        };

        cells.push((charge, state));
    }
    cells
}

fn read_managed_cells(manager: Option<&Manager>) -> Vec<(i64, BatteryState)> {
    let Some(manager) = manager else {
        return Vec::new();
    };
    let batteries = match manager.batteries() {
        Ok(batteries) => batteries,
        Err(err) => {
            warn!(event = "battery_enumeration_failed", error = %err);
            return Vec::new();
        }
    };
    batteries
        .filter_map(|battery| match battery {
            Ok(battery) => {
                let charge = battery.state_of_charge().get::<percent>().round() as i64;
                Some((charge, map_state(battery.state())))
            }
            Err(err) => {
                warn!(event = "battery_read_failed", error = %err);
                None
            }
        })
        .collect()
}

fn map_state(state: State) -> BatteryState {
    match state {
        State::Charging => BatteryState::Charging,
        State::Discharging => BatteryState::Discharging,
        State::Empty => BatteryState::Empty,
        State::Full => BatteryState::Full,
        State::Unknown => BatteryState::Unknown,
    }
}

/// Builds the full battery string: per cell, the symbol, an index tag, the
/// band-colored charge and the state glyph. Cells whose charge classifies
/// as garbage are skipped entirely.
fn render_batteries(config: &BatteryConfig, cells: &[(i64, BatteryState)]) -> String {
    let style = config.style();
    let symbol_style = config.symbol_style();
    let mut out = String::new();

    for (index, (charge, state)) in cells.iter().enumerate() {
        let Some(band) = charge_band(*charge) else {
            continue;
        };
        let band_color = match band {
            ChargeBand::Full => &config.charge_color.full,
            ChargeBand::AlmostFull => &config.charge_color.almost_full,
            ChargeBand::AlmostEmpty => &config.charge_color.almost_empty,
            ChargeBand::Empty => &config.charge_color.empty,
        };
        let mut charge_style = style.clone();
        if !band_color.is_empty() {
            charge_style.color = band_color.clone();
        }

        out.push_str(&span(&symbol_style, &config.symbol));
        out.push_str(&span(&style, &format!("B{index} ")));
        out.push_str(&span(&charge_style, &format!("{charge:>3}%")));
        out.push_str(&span(&style, &format!(" {}", state.glyph())));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BatteryConfig {
        BatteryConfig {
            color: "#ffffff".to_string(),
            symbol: "⚡".to_string(),
            charge_color: crate::config::ChargeColors {
                full: "#00cc00".to_string(),
                empty: "#cc0000".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn full_band_uses_configured_color_at_boundary() {
        let text = render_batteries(&config(), &[(84, BatteryState::Discharging)]);
        assert!(text.contains("#00cc00"));
        assert!(text.contains(" 84%"));
        assert!(text.contains("▼"));
    }

    #[test]
    fn almost_full_without_configured_color_keeps_default() {
        let text = render_batteries(&config(), &[(83, BatteryState::Charging)]);
        assert!(!text.contains("#00cc00"));
        assert!(text.contains(" 83%"));
        assert!(text.contains("▲"));
    }

    #[test]
    fn multiple_cells_are_indexed() {
        let text = render_batteries(
            &config(),
            &[(90, BatteryState::Full), (9, BatteryState::Discharging)],
        );
        assert!(text.contains("B0 "));
        assert!(text.contains("B1 "));
        assert!(text.contains("#cc0000")); // empty band on the second cell
        assert!(text.contains("  9%"));
    }

    #[test]
    fn garbage_charge_is_skipped() {
        assert_eq!(render_batteries(&config(), &[(501, BatteryState::Unknown)]), "");
        assert_eq!(render_batteries(&config(), &[(-3, BatteryState::Unknown)]), "");
    }
}
