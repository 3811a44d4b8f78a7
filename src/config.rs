//! Configuration and color scheme management for memterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.memterm/config.toml`
//! - Built-in color schemes mapping every text style to a color
//!
//! # Configuration File
//!
//! ```toml
//! # Color scheme: default, solarized-dark, nord, gruvbox-dark
//! color_scheme = "nord"
//!
//! [examine_memory]
//! size_to_show = 32
//! highlight_word_size = 4
//!
//! [terminal]
//! poll_interval_ms = 25
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::memory::WordSize;
use crate::ui::Style;

/// Byte counts offered by the examine memory view
pub const BYTE_CHOICES: [usize; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Color scheme name
    pub color_scheme: String,
    /// Memory view settings
    pub examine_memory: ExamineMemoryConfig,
    /// Terminal panel settings
    pub terminal: TerminalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_scheme: "default".to_string(),
            examine_memory: ExamineMemoryConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

/// Examine memory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamineMemoryConfig {
    /// Number of bytes requested per capture
    pub size_to_show: usize,
    /// Highlight granularity in bytes (1, 2, 4 or 8)
    pub highlight_word_size: u32,
}

impl Default for ExamineMemoryConfig {
    fn default() -> Self {
        Self {
            size_to_show: 32,
            // 4 bytes covers int/float sized variables; 8 suits pointer-heavy code
            highlight_word_size: 4,
        }
    }
}

impl ExamineMemoryConfig {
    /// Configured byte count, or 32 when it is not one of the offered choices
    pub fn bytes(&self) -> usize {
        if BYTE_CHOICES.contains(&self.size_to_show) {
            self.size_to_show
        } else {
            32
        }
    }

    /// Configured word size, falling back to 4 bytes when invalid
    pub fn word_size(&self) -> WordSize {
        WordSize::try_from(self.highlight_word_size).unwrap_or_else(|_| {
            warn!(
                "Invalid highlight_word_size {}, using 4",
                self.highlight_word_size
            );
            WordSize::Four
        })
    }
}

/// Terminal panel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Output poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 25,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), String> {
        match Self::get_config_path() {
            Some(path) => self.save_to(&path),
            None => Err("Could not determine config path".to_string()),
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        let dir = data_dir()?;
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Color scheme definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    pub background: Color,
    pub text: Color,

    // Memory view
    pub changed: Color,

    // Terminal transcript
    pub banner: Color,
    pub info: Color,
    pub output: Color,
    pub stderr: Color,
    pub failure: Color,
    pub sent: Color,
    pub typing: Color,
    pub exited: Color,

    // Status line
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default color scheme
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),

            background: Color::new(0, 0, 0),
            text: Color::new(200, 200, 200),

            changed: Color::new(255, 0, 0),

            banner: Color::new(100, 200, 255),
            info: Color::new(100, 200, 255),
            output: Color::new(200, 200, 200),
            stderr: Color::new(255, 150, 150),
            failure: Color::new(255, 100, 100),
            sent: Color::new(150, 255, 150),
            typing: Color::new(255, 255, 150),
            exited: Color::new(100, 255, 100),

            status_bar_bg: Color::new(0, 100, 0),
            status_bar_fg: Color::new(255, 255, 255),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),

            background: Color::new(0, 43, 54),
            text: Color::new(147, 161, 161),

            changed: Color::new(220, 50, 47),

            banner: Color::new(38, 139, 210),
            info: Color::new(42, 161, 152),
            output: Color::new(147, 161, 161),
            stderr: Color::new(203, 75, 22),
            failure: Color::new(220, 50, 47),
            sent: Color::new(133, 153, 0),
            typing: Color::new(181, 137, 0),
            exited: Color::new(133, 153, 0),

            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),

            background: Color::new(46, 52, 64),
            text: Color::new(216, 222, 233),

            changed: Color::new(191, 97, 106),

            banner: Color::new(136, 192, 208),
            info: Color::new(129, 161, 193),
            output: Color::new(216, 222, 233),
            stderr: Color::new(208, 135, 112),
            failure: Color::new(191, 97, 106),
            sent: Color::new(163, 190, 140),
            typing: Color::new(235, 203, 139),
            exited: Color::new(163, 190, 140),

            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
        }
    }

    /// Gruvbox Dark scheme
    pub fn gruvbox_dark() -> Self {
        Self {
            name: "gruvbox-dark".to_string(),

            background: Color::new(40, 40, 40),
            text: Color::new(235, 219, 178),

            changed: Color::new(251, 73, 52),

            banner: Color::new(131, 165, 152),
            info: Color::new(131, 165, 152),
            output: Color::new(235, 219, 178),
            stderr: Color::new(254, 128, 25),
            failure: Color::new(251, 73, 52),
            sent: Color::new(184, 187, 38),
            typing: Color::new(250, 189, 47),
            exited: Color::new(152, 151, 26),

            status_bar_bg: Color::new(60, 56, 54),
            status_bar_fg: Color::new(235, 219, 178),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "nord" => Self::nord(),
            "gruvbox-dark" | "gruvbox_dark" | "gruvbox" => Self::gruvbox_dark(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "solarized-dark", "nord", "gruvbox-dark"]
    }

    /// Foreground color for a text style
    pub fn color_for(&self, style: Style) -> Color {
        match style {
            Style::Default => self.text,
            Style::Changed => self.changed,
            Style::Banner => self.banner,
            Style::Info => self.info,
            Style::Output => self.output,
            Style::Stderr => self.stderr,
            Style::Failure => self.failure,
            Style::Sent => self.sent,
            Style::Typing => self.typing,
            Style::Exited => self.exited,
        }
    }
}

/// Directory holding config and log files
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".memterm"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
