//! Wheel-driven volume stepping. Integer percent end to end so the clamp
//! arithmetic is exact.

use serde::Deserialize;

/// Click-adjustment configuration for the volume block.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeControl {
    /// Step in percentage points per wheel notch.
    #[serde(default = "VolumeControl::default_step")]
    pub step: u32,
    /// Button code that raises the volume.
    #[serde(default = "VolumeControl::default_wheel_up")]
    pub wheel_up: u8,
    /// Button code that lowers the volume.
    #[serde(default = "VolumeControl::default_wheel_down")]
    pub wheel_down: u8,
    /// Upper clamp in percent.
    #[serde(default = "VolumeControl::default_max")]
    pub max_volume_limit: u32,
    /// Command to run on right click instead of adjusting.
    #[serde(default)]
    pub right_click_cmd: Vec<String>,
}

impl Default for VolumeControl {
    fn default() -> Self {
        VolumeControl {
            step: Self::default_step(),
            wheel_up: Self::default_wheel_up(),
            wheel_down: Self::default_wheel_down(),
            max_volume_limit: Self::default_max(),
            right_click_cmd: Vec::new(),
        }
    }
}

impl VolumeControl {
    fn default_step() -> u32 {
        5
    }
    fn default_wheel_up() -> u8 {
        4
    }
    fn default_wheel_down() -> u8 {
        5
    }
    fn default_max() -> u32 {
        100
    }
}

/// Applies one wheel notch to `current` percent. Returns `None` when the
/// button is neither wheel direction.
pub fn step_volume(current: u32, button: u8, control: &VolumeControl) -> Option<u32> {
    if button == control.wheel_up {
        Some((current + control.step).min(control.max_volume_limit))
    } else if button == control.wheel_down {
        Some(current.saturating_sub(control.step))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> VolumeControl {
        VolumeControl::default()
    }

    #[test]
    fn wheel_up_clamps_to_max() {
        assert_eq!(step_volume(98, 4, &control()), Some(100));
        assert_eq!(step_volume(100, 4, &control()), Some(100));
        assert_eq!(step_volume(50, 4, &control()), Some(55));
    }

    #[test]
    fn wheel_down_clamps_to_zero() {
        assert_eq!(step_volume(2, 5, &control()), Some(0));
        assert_eq!(step_volume(0, 5, &control()), Some(0));
        assert_eq!(step_volume(50, 5, &control()), Some(45));
    }

    #[test]
    fn other_buttons_do_not_step() {
        assert_eq!(step_volume(50, 1, &control()), None);
        assert_eq!(step_volume(50, 3, &control()), None);
    }

    #[test]
    fn custom_limit_is_respected() {
        let mut c = control();
        c.max_volume_limit = 150;
        c.step = 10;
        assert_eq!(step_volume(145, 4, &c), Some(150));
        assert_eq!(step_volume(140, 4, &c), Some(150));
    }
}
