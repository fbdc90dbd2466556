//! Startup configuration: parsed once from JSON into an immutable snapshot
//! that every component receives by `Arc`. Runtime-mutable state (pause
//! flag, volume, window counts) lives in the owning components, never here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use serde::Deserialize;

use barline_core::pango::SpanStyle;
use barline_core::route::{AppEntry, ClockClicks, Routing};
use barline_core::volume::VolumeControl;

/// Written next to the XDG config dir on first run.
const DEFAULT_CONFIG: &str = include_str!("../assets/default-config.json");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeparatorSide {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub symbol: String,
    pub font: String,
    pub font_size: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Separator {
    pub left: SeparatorSide,
    pub right: SeparatorSide,
}

impl SeparatorSide {
    pub fn style(&self) -> SpanStyle {
        SpanStyle::new(&self.color, &self.background, &self.font, &self.font_size)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadAvgConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub show_swap: bool,
    pub separator: Separator,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,
    #[serde(flatten)]
    pub clicks: ClockClicks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChargeColors {
    pub full: String,
    pub empty: String,
    pub almost_full: String,
    pub almost_empty: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub symbol: String,
    pub symbol_font: String,
    pub symbol_font_size: String,
    pub use_sysfs: bool,
    pub sysfs_files: Vec<String>,
    pub charge_color: ChargeColors,
    pub separator: Separator,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuTempConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,
    pub file: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TcpCheck {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Dial timeout in seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    #[serde(rename = "statusFile")]
    pub status_file: String,
    /// Maximum status-file age in seconds before the tunnel counts as down.
    pub mtime_threshold: u64,
    pub down_color: String,
    pub up_color: String,
    pub separator: Separator,
    pub tcp_check: TcpCheck,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub symbol: String,
    pub symbol_font: String,
    pub symbol_font_size: String,
    /// Relaunch the audio daemon with an infinite idle timeout so a logout
    /// elsewhere cannot take the session's audio down.
    pub dont_exit_on_login: bool,
    pub separator: Separator,
    #[serde(flatten)]
    pub control: VolumeControl,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetIfEntry {
    pub name: String,
    pub dir: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetIfConfig {
    pub enabled: bool,
    pub down_color: String,
    pub up_color: String,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,
    #[serde(rename = "if")]
    pub interfaces: Vec<NetIfEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CmdRunConfig {
    pub enabled: bool,
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,
    pub cmd: String,
    pub args: Vec<String>,
    /// Steady-state interval in seconds between runs.
    pub delay: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppButtonsConfig {
    pub enabled: bool,
    pub separator: Separator,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default text color, inherited by sources that leave theirs empty.
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
    pub separator: Separator,

    pub la: LoadAvgConfig,
    pub mem: MemConfig,
    pub clock: ClockConfig,
    pub battery: BatteryConfig,
    pub cpu_temp: CpuTempConfig,
    pub vpn: VpnConfig,
    #[serde(rename = "simple-volume-pa")]
    pub volume: VolumeConfig,
    #[serde(rename = "net-if")]
    pub net_if: NetIfConfig,
    pub cmd_run: CmdRunConfig,
    pub app_buttons: AppButtonsConfig,
    pub apps: Vec<AppEntry>,
}

macro_rules! style_accessor {
    ($ty:ty) => {
        impl $ty {
            pub fn style(&self) -> SpanStyle {
                SpanStyle::new(&self.color, &self.background, &self.font, &self.font_size)
            }
        }
    };
}

style_accessor!(LoadAvgConfig);
style_accessor!(MemConfig);
style_accessor!(ClockConfig);
style_accessor!(BatteryConfig);
style_accessor!(CpuTempConfig);
style_accessor!(VpnConfig);
style_accessor!(VolumeConfig);
style_accessor!(NetIfConfig);
style_accessor!(CmdRunConfig);

impl BatteryConfig {
    pub fn symbol_style(&self) -> SpanStyle {
        SpanStyle::new(
            &self.color,
            &self.background,
            &self.symbol_font,
            &self.symbol_font_size,
        )
    }
}

impl VolumeConfig {
    pub fn symbol_style(&self) -> SpanStyle {
        SpanStyle::new(
            &self.color,
            &self.background,
            &self.symbol_font,
            &self.symbol_font_size,
        )
    }
}

impl Config {
    /// The click-dispatch view of this configuration.
    pub fn routing(&self) -> Routing {
        Routing {
            clock: self.clock.clicks.clone(),
            volume_enabled: self.volume.enabled,
            app_buttons_enabled: self.app_buttons.enabled,
            apps: self.apps.clone(),
        }
    }

    /// Fills empty per-source styling fields from the top-level defaults so
    /// renderers never have to consult two levels.
    fn apply_defaults(&mut self) {
        fn inherit(field: &mut String, default: &str) {
            if field.is_empty() {
                *field = default.to_string();
            }
        }
        macro_rules! inherit_style {
            ($section:expr) => {
                inherit(&mut $section.color, &self.color);
                inherit(&mut $section.background, &self.background);
                inherit(&mut $section.font, &self.font);
                inherit(&mut $section.font_size, &self.font_size);
            };
        }
        inherit_style!(self.la);
        inherit_style!(self.mem);
        inherit_style!(self.clock);
        inherit_style!(self.battery);
        inherit_style!(self.cpu_temp);
        inherit_style!(self.vpn);
        inherit_style!(self.volume);
        inherit_style!(self.net_if);
        inherit_style!(self.cmd_run);
        inherit(&mut self.battery.symbol_font, &self.battery.font);
        inherit(&mut self.battery.symbol_font_size, &self.battery.font_size);
        inherit(&mut self.volume.symbol_font, &self.volume.font);
        inherit(&mut self.volume.symbol_font_size, &self.volume.font_size);

        for entry in &mut self.net_if.interfaces {
            if entry.name.is_empty() {
                entry.name = Path::new(&entry.dir)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
        }
    }
}

/// Loads the configuration: an explicit `--config` path, or the XDG default,
/// writing out the embedded default file on first run.
pub fn load(path_arg: &str) -> anyhow::Result<Config> {
    let path = if path_arg.is_empty() {
        default_path()?
    } else {
        PathBuf::from(path_arg)
    };

    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }
        fs::write(&path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", path.display()))?;
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn parse(text: &str) -> anyhow::Result<Config> {
    let mut config: Config = serde_json::from_str(text)?;
    config.apply_defaults();
    Ok(config)
}

fn default_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("no config directory for this user"))?;
    Ok(base.join("barline").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_config_parses() {
        let config = parse(DEFAULT_CONFIG).expect("default config must parse");
        assert!(config.clock.enabled);
        assert!(!config.color.is_empty());
    }

    #[test]
    fn empty_object_defaults_everything_off() {
        let config = parse("{}").expect("parse");
        assert!(!config.clock.enabled);
        assert!(!config.battery.enabled);
        assert!(config.apps.is_empty());
    }

    #[test]
    fn sources_inherit_global_styling() {
        let config = parse(
            r##"{
                "color": "#ffffff",
                "font": "monospace",
                "la": {"enabled": true},
                "mem": {"enabled": true, "color": "#ff0000"}
            }"##,
        )
        .expect("parse");
        assert_eq!(config.la.color, "#ffffff");
        assert_eq!(config.la.font, "monospace");
        assert_eq!(config.mem.color, "#ff0000");
    }

    #[test]
    fn interface_names_default_to_directory_basename() {
        let config = parse(
            r#"{"net-if": {"enabled": true, "if": [{"dir": "/sys/class/net/eth0"}]}}"#,
        )
        .expect("parse");
        assert_eq!(config.net_if.interfaces[0].name, "eth0");
    }

    #[test]
    fn volume_control_fields_flatten_into_volume_section() {
        let config = parse(
            r#"{"simple-volume-pa": {"enabled": true, "step": 2, "wheel_up": 4, "max_volume_limit": 120}}"#,
        )
        .expect("parse");
        assert_eq!(config.volume.control.step, 2);
        assert_eq!(config.volume.control.max_volume_limit, 120);
    }

    #[test]
    fn clock_click_actions_flatten_into_clock_section() {
        let config = parse(
            r#"{"clock": {"enabled": true, "left_click": {"enabled": true, "cmd": ["gsimplecal"]}}}"#,
        )
        .expect("parse");
        assert!(config.clock.clicks.left_click.enabled);
        assert_eq!(config.clock.clicks.left_click.cmd, vec!["gsimplecal"]);
    }
}
