use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("../../shellwm.default.toml");

pub fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("shellwm")
}

pub fn state_file(namespace: &str) -> PathBuf { data_dir().join(format!("{namespace}.json")) }

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shellwm")
        .join("config.toml")
}

/// Runtime changes to the configuration, applied with [`Config::apply_command`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCommand {
    SetAnimate(bool),
    SetAnimationDuration(f64),
    SetAnimationEasing(AnimationEasing),
    SetSnapping(bool),
    SetHoverDelay(u64),
    SetCapsuleAutoPosition(bool),

    /// Generic setter for arbitrary config paths using dot-separated keys.
    /// Example: key = "settings.snapping.corner_size", value = 120
    Set {
        key: String,
        value: Value,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "yes")]
    pub animate: bool,
    /// Seconds.
    #[serde(default = "default_animation_duration")]
    pub animation_duration: f64,
    #[serde(default)]
    pub animation_easing: AnimationEasing,
    /// Redraw tick used by [`crate::engine::WindowManagerContext::run`].
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub snapping: SnapSettings,
    #[serde(default)]
    pub capsule: CapsuleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            animate: true,
            animation_duration: default_animation_duration(),
            animation_easing: AnimationEasing::default(),
            tick_interval_ms: default_tick_interval_ms(),
            window: WindowSettings::default(),
            snapping: SnapSettings::default(),
            capsule: CapsuleSettings::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AnimationEasing {
    #[default]
    EaseInOut,
    Linear,
    EaseOutCubic,
    EaseInOutQuad,
}

impl AnimationEasing {
    /// Maps linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            // https://notes.yvt.jp/Graphics/Easing-Functions/
            AnimationEasing::EaseInOut => {
                if t < 0.5 {
                    (1.0 - f64::sqrt(1.0 - f64::powi(2.0 * t, 2))) / 2.0
                } else {
                    (f64::sqrt(1.0 - f64::powi(-2.0 * t + 2.0, 2)) + 1.0) / 2.0
                }
            }
            AnimationEasing::Linear => t,
            AnimationEasing::EaseOutCubic => 1.0 - f64::powi(1.0 - t, 3),
            AnimationEasing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - f64::powi(-2.0 * t + 2.0, 2) / 2.0
                }
            }
        }
    }
}

/// Window chrome and placement.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WindowSettings {
    #[serde(default = "default_window_width")]
    pub default_width: i32,
    #[serde(default = "default_window_height")]
    pub default_height: i32,
    #[serde(default = "default_min_width")]
    pub min_width: i32,
    #[serde(default = "default_min_height")]
    pub min_height: i32,
    #[serde(default = "default_cascade_origin")]
    pub cascade_origin_x: i32,
    #[serde(default = "default_cascade_origin")]
    pub cascade_origin_y: i32,
    #[serde(default = "default_cascade_offset")]
    pub cascade_offset: i32,
    #[serde(default = "default_titlebar_height")]
    pub titlebar_height: i32,
    #[serde(default = "default_control_button_width")]
    pub control_button_width: i32,
    #[serde(default = "default_resize_handle_size")]
    pub resize_handle_size: i32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            default_width: default_window_width(),
            default_height: default_window_height(),
            min_width: default_min_width(),
            min_height: default_min_height(),
            cascade_origin_x: default_cascade_origin(),
            cascade_origin_y: default_cascade_origin(),
            cascade_offset: default_cascade_offset(),
            titlebar_height: default_titlebar_height(),
            control_button_width: default_control_button_width(),
            resize_handle_size: default_resize_handle_size(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct SnapSettings {
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Side of the square hit region in each desktop corner.
    #[serde(default = "default_corner_size")]
    pub corner_size: i32,
    /// Thickness of the hit strip along each desktop edge.
    #[serde(default = "default_edge_size")]
    pub edge_size: i32,
    /// How long the pointer must rest in a zone before the preview appears.
    #[serde(default = "default_hover_delay_ms")]
    pub hover_delay_ms: u64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            corner_size: default_corner_size(),
            edge_size: default_edge_size(),
            hover_delay_ms: default_hover_delay_ms(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct CapsuleSettings {
    #[serde(default = "default_capsule_min_width")]
    pub min_width: i32,
    #[serde(default = "default_capsule_max_width")]
    pub max_width: i32,
    /// Average advance of one title character.
    #[serde(default = "default_char_width")]
    pub char_width: i32,
    /// Icon, buttons and padding around the title.
    #[serde(default = "default_chrome_padding")]
    pub chrome_padding: i32,
    #[serde(default = "default_capsule_titlebar_height")]
    pub titlebar_height: i32,
    #[serde(default = "default_preview_height")]
    pub preview_height: i32,
    #[serde(default = "default_info_bar_height")]
    pub info_bar_height: i32,
    #[serde(default = "yes")]
    pub auto_position: bool,
    #[serde(default = "default_capsule_margin")]
    pub margin: i32,
    #[serde(default = "default_capsule_cascade_offset")]
    pub cascade_offset: i32,
}

impl Default for CapsuleSettings {
    fn default() -> Self {
        Self {
            min_width: default_capsule_min_width(),
            max_width: default_capsule_max_width(),
            char_width: default_char_width(),
            chrome_padding: default_chrome_padding(),
            titlebar_height: default_capsule_titlebar_height(),
            preview_height: default_preview_height(),
            info_bar_height: default_info_bar_height(),
            auto_position: true,
            margin: default_capsule_margin(),
            cascade_offset: default_capsule_cascade_offset(),
        }
    }
}

impl CapsuleSettings {
    pub fn compact_height(&self) -> i32 {
        self.titlebar_height + self.preview_height + self.info_bar_height
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct PersistenceSettings {
    #[serde(default = "yes")]
    pub enabled: bool,
    /// First segment of every stored key: `namespace:app_type:instance_id`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    /// Overrides the state file location (defaults to the data dir).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_namespace(),
            max_age_days: default_max_age_days(),
            path: None,
        }
    }
}

impl PersistenceSettings {
    pub fn state_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| state_file(&self.namespace))
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(0.0..=MAX_ANIMATION_DURATION).contains(&self.animation_duration) {
            issues.push(format!(
                "animation_duration must be between 0 and {MAX_ANIMATION_DURATION} seconds, got {}",
                self.animation_duration
            ));
        }
        if self.tick_interval_ms == 0 {
            issues.push("tick_interval_ms must be positive".to_string());
        }

        issues.extend(self.window.validate());
        issues.extend(self.snapping.validate());
        issues.extend(self.capsule.validate());

        issues
    }
}

impl WindowSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.min_width <= 0 || self.min_height <= 0 {
            issues.push("window.min_width and window.min_height must be positive".to_string());
        }
        if self.default_width < self.min_width {
            issues.push(format!(
                "window.default_width ({}) is below window.min_width ({})",
                self.default_width, self.min_width
            ));
        }
        if self.default_height < self.min_height {
            issues.push(format!(
                "window.default_height ({}) is below window.min_height ({})",
                self.default_height, self.min_height
            ));
        }
        if self.cascade_offset < 0 {
            issues.push("window.cascade_offset must be non-negative".to_string());
        }
        if self.titlebar_height <= 0 {
            issues.push("window.titlebar_height must be positive".to_string());
        }
        if self.resize_handle_size < 0 || self.control_button_width < 0 {
            issues.push("window handle and button sizes must be non-negative".to_string());
        }
        issues
    }
}

impl SnapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.corner_size < 0 {
            issues.push("snapping.corner_size must be non-negative".to_string());
        }
        if self.edge_size <= 0 {
            issues.push("snapping.edge_size must be positive".to_string());
        }
        issues
    }
}

impl CapsuleSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.min_width <= 0 {
            issues.push("capsule.min_width must be positive".to_string());
        }
        if self.min_width > self.max_width {
            issues.push(format!(
                "capsule.min_width ({}) must not exceed capsule.max_width ({})",
                self.min_width, self.max_width
            ));
        }
        if self.char_width <= 0 {
            issues.push("capsule.char_width must be positive".to_string());
        }
        if self.compact_height() <= 0 {
            issues.push("capsule heights must add up to a positive value".to_string());
        }
        issues
    }
}

impl PersistenceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.namespace.is_empty() {
            issues.push("persistence.namespace must not be empty".to_string());
        } else if self.namespace.contains(':') {
            issues.push("persistence.namespace must not contain ':'".to_string());
        }
        issues
    }
}

fn yes() -> bool { true }

/// Longest accepted snap animation, in seconds.
pub const MAX_ANIMATION_DURATION: f64 = 5.0;

fn default_animation_duration() -> f64 { 0.2 }

fn default_tick_interval_ms() -> u64 { 16 }

fn default_window_width() -> i32 { 800 }

fn default_window_height() -> i32 { 600 }

fn default_min_width() -> i32 { 320 }

fn default_min_height() -> i32 { 200 }

fn default_cascade_origin() -> i32 { 40 }

fn default_cascade_offset() -> i32 { 30 }

fn default_titlebar_height() -> i32 { 32 }

fn default_control_button_width() -> i32 { 40 }

fn default_resize_handle_size() -> i32 { 6 }

fn default_corner_size() -> i32 { 100 }

fn default_edge_size() -> i32 { 16 }

fn default_hover_delay_ms() -> u64 { 800 }

fn default_capsule_min_width() -> i32 { 200 }

fn default_capsule_max_width() -> i32 { 360 }

fn default_char_width() -> i32 { 8 }

fn default_chrome_padding() -> i32 { 96 }

fn default_capsule_titlebar_height() -> i32 { 28 }

fn default_preview_height() -> i32 { 120 }

fn default_info_bar_height() -> i32 { 24 }

fn default_capsule_margin() -> i32 { 16 }

fn default_capsule_cascade_offset() -> i32 { 24 }

fn default_namespace() -> String { "shellwm".to_string() }

fn default_max_age_days() -> u64 { 30 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&buf)
    }

    /// The configuration shipped in `shellwm.default.toml`.
    pub fn embedded_default() -> anyhow::Result<Config> { Self::parse(DEFAULT_CONFIG) }

    /// Reads `path` when it exists, otherwise falls back to the defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.settings.validate());
        issues.extend(self.persistence.validate());
        issues
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => bail!("{e}"),
        }
    }

    /// Applies `cmd` to a copy of the config and swaps it in only if the result
    /// validates.
    pub fn apply_command(&mut self, cmd: ConfigCommand) -> Result<(), String> {
        let mut new_config = self.clone();
        let mut errors: Vec<String> = Vec::new();

        match cmd {
            ConfigCommand::SetAnimate(v) => new_config.settings.animate = v,
            ConfigCommand::SetAnimationDuration(v) => {
                if (0.0..=MAX_ANIMATION_DURATION).contains(&v) {
                    new_config.settings.animation_duration = v;
                } else {
                    errors.push(format!(
                        "Invalid animation_duration value: {v}. Must be between 0 and 5"
                    ));
                }
            }
            ConfigCommand::SetAnimationEasing(v) => new_config.settings.animation_easing = v,
            ConfigCommand::SetSnapping(v) => new_config.settings.snapping.enabled = v,
            ConfigCommand::SetHoverDelay(v) => {
                if v <= 10_000 {
                    new_config.settings.snapping.hover_delay_ms = v;
                } else {
                    errors.push(format!("Invalid hover_delay_ms value: {v}. Must be <= 10000"));
                }
            }
            ConfigCommand::SetCapsuleAutoPosition(v) => {
                new_config.settings.capsule.auto_position = v
            }
            ConfigCommand::Set { key, value } => match set_by_path(&new_config, &key, value) {
                Ok(cfg) => new_config = cfg,
                Err(e) => errors.push(e),
            },
        }

        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        let validation_issues = new_config.validate();
        if !validation_issues.is_empty() {
            return Err(validation_issues.join("; "));
        }

        if new_config != *self {
            info!("config updated");
            *self = new_config;
        }
        Ok(())
    }
}

fn set_by_path(config: &Config, key: &str, value: Value) -> Result<Config, String> {
    let mut cfg_val = serde_json::to_value(config)
        .map_err(|e| format!("Failed to serialize config for modification: {e}"))?;
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((last, parents)) = parts.split_last() else {
        return Err("Empty config key provided".to_string());
    };

    let mut cur = &mut cfg_val;
    for part in parents {
        cur = cur
            .as_object_mut()
            .and_then(|obj| obj.get_mut(*part))
            .ok_or_else(|| format!("Invalid config path: {key}"))?;
    }
    let obj = cur.as_object_mut().ok_or_else(|| format!("Invalid config path: {key}"))?;
    if !obj.contains_key(*last) {
        return Err(format!("Unknown config key: {key}"));
    }
    obj.insert(last.to_string(), value);

    serde_json::from_value::<Config>(cfg_val)
        .map_err(|e| format!("Failed to deserialize config after setting '{key}': {e}"))
}
