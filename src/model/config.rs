use serde::{Deserialize, Serialize};

/// Configuration from config.toml in the data directory.
/// Every section is optional; a missing file means all defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Session length used by `focus start` when no --minutes is given
    #[serde(default = "default_focus_minutes")]
    pub default_minutes: u32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        FocusConfig {
            default_minutes: default_focus_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            poll_seconds: default_poll_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// An `EnvFilter` directive, e.g. "warn" or "ticknote=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteConfig {
    /// Colors handed out to new lists that don't name one
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        PaletteConfig {
            colors: default_colors(),
        }
    }
}

fn default_focus_minutes() -> u32 {
    30
}

fn default_poll_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_colors() -> Vec<String> {
    [
        "red", "orange", "yellow", "lime", "green", "emerald", "teal", "cyan", "blue", "indigo",
        "violet", "purple", "fuchsia", "pink", "rose",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}
