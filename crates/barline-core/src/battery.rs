//! Charge-level classification for the battery renderer.
//!
//! The band boundaries are deliberate and pinned by tests: 84% and up reads
//! as full, 41–83 almost full, 10–40 almost empty, 0–9 empty. Charges above
//! 500% are treated as calibration garbage and classified as nothing at all
//! (overcharged cells can legitimately report slightly over 100%, so the cap
//! is generous).

/// Charge band, each with its own configurable text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeBand {
    Full,
    AlmostFull,
    AlmostEmpty,
    Empty,
}

/// Classifies a charge percentage, or `None` for out-of-range garbage.
pub fn charge_band(charge: i64) -> Option<ChargeBand> {
    match charge {
        84..=500 => Some(ChargeBand::Full),
        41..=83 => Some(ChargeBand::AlmostFull),
        10..=40 => Some(ChargeBand::AlmostEmpty),
        0..=9 => Some(ChargeBand::Empty),
        _ => None,
    }
}

/// Reported charging state of one battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Charging,
    Discharging,
    Empty,
    Full,
    Unknown,
}

impl BatteryState {
    /// Glyph appended after the charge percentage.
    pub fn glyph(self) -> &'static str {
        match self {
            BatteryState::Charging => "▲",
            BatteryState::Discharging => "▼",
            BatteryState::Empty => "✘",
            BatteryState::Full | BatteryState::Unknown => "•",
        }
    }

    /// Maps the sysfs `status` file contents.
    pub fn from_sysfs(status: &str) -> Self {
        match status {
            "Charging" => BatteryState::Charging,
            "Discharging" => BatteryState::Discharging,
            "Empty" => BatteryState::Empty,
            "Full" => BatteryState::Full,
            _ => BatteryState::Unknown,
        }
    }
}
