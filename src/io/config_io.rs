use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    EditError(#[from] toml_edit::TomlError),
    #[error("unknown config key {0:?} (expected section.key)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Pick the data directory: explicit flag, then `TICKNOTE_DIR`, then the XDG
/// data home, then `~/.local/share/ticknote`.
pub fn resolve_data_dir(flag: Option<&str>) -> Option<PathBuf> {
    data_dir_from(
        flag,
        std::env::var_os("TICKNOTE_DIR").map(PathBuf::from),
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn data_dir_from(
    flag: Option<&str>,
    ticknote_dir: Option<PathBuf>,
    xdg_data_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    let nonempty = |p: &PathBuf| !p.as_os_str().is_empty();
    if let Some(dir) = flag.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    if let Some(dir) = ticknote_dir.filter(nonempty) {
        return Some(dir);
    }
    if let Some(xdg) = xdg_data_home.filter(nonempty) {
        return Some(xdg.join("ticknote"));
    }
    home.filter(nonempty)
        .map(|h| h.join(".local").join("share").join("ticknote"))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Load config.toml. A missing file yields defaults; a broken one is an error
/// so that a typo doesn't silently reset every setting.
pub fn read_config(data_dir: &Path) -> Result<AppConfig, ConfigError> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
        path: path.clone(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Set `section.key = value` in config.toml, preserving comments and layout.
/// The value is parsed as a TOML value when possible (numbers, arrays),
/// otherwise stored as a string. The result must still load as `AppConfig`.
pub fn set_config_value(data_dir: &Path, dotted_key: &str, raw_value: &str) -> Result<AppConfig, ConfigError> {
    let (section, key) = dotted_key
        .split_once('.')
        .filter(|(s, k)| !s.is_empty() && !k.is_empty() && !k.contains('.'))
        .ok_or_else(|| ConfigError::UnknownKey(dotted_key.to_string()))?;

    let path = config_path(data_dir);
    let text = if path.exists() {
        fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?
    } else {
        String::new()
    };
    let mut doc: toml_edit::DocumentMut = text.parse()?;

    let value = raw_value
        .parse::<toml_edit::Value>()
        .unwrap_or_else(|_| toml_edit::Value::from(raw_value));
    if !doc.contains_table(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][key] = toml_edit::Item::Value(value);

    let updated = doc.to_string();
    let config: AppConfig = toml::from_str(&updated).map_err(|e| ConfigError::InvalidValue {
        key: dotted_key.to_string(),
        reason: e.message().to_string(),
    })?;
    if !known_key(section, key) {
        return Err(ConfigError::UnknownKey(dotted_key.to_string()));
    }

    fs::write(&path, updated).map_err(|source| ConfigError::ReadError { path, source })?;
    Ok(config)
}

fn known_key(section: &str, key: &str) -> bool {
    matches!(
        (section, key),
        ("focus", "default_minutes")
            | ("reminders", "poll_seconds")
            | ("log", "level")
            | ("palette", "colors")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn data_dir_precedence() {
        let p = |s: &str| Some(PathBuf::from(s));
        assert_eq!(
            data_dir_from(Some("/flag"), p("/env"), p("/xdg"), p("/home/u")),
            p("/flag")
        );
        assert_eq!(data_dir_from(None, p("/env"), p("/xdg"), p("/home/u")), p("/env"));
        assert_eq!(
            data_dir_from(None, None, p("/xdg"), p("/home/u")),
            p("/xdg/ticknote")
        );
        assert_eq!(
            data_dir_from(None, p(""), None, p("/home/u")),
            p("/home/u/.local/share/ticknote")
        );
        assert_eq!(data_dir_from(None, None, None, None), None);
    }

    const SAMPLE: &str = "# my settings\n[focus]\ndefault_minutes = 60 # long sessions\n";

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_config(tmp.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn broken_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(config_path(tmp.path()), "[focus\n").unwrap();
        assert!(matches!(read_config(tmp.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn set_value_preserves_comments() {
        let tmp = TempDir::new().unwrap();
        fs::write(config_path(tmp.path()), SAMPLE).unwrap();

        let config = set_config_value(tmp.path(), "reminders.poll_seconds", "10").unwrap();
        assert_eq!(config.reminders.poll_seconds, 10);
        assert_eq!(config.focus.default_minutes, 60);

        let written = fs::read_to_string(config_path(tmp.path())).unwrap();
        assert!(written.starts_with("# my settings\n"));
        assert!(written.contains("# long sessions"));
        assert!(written.contains("poll_seconds = 10"));
    }

    #[test]
    fn set_value_creates_file() {
        let tmp = TempDir::new().unwrap();
        set_config_value(tmp.path(), "log.level", "debug").unwrap();
        assert_eq!(read_config(tmp.path()).unwrap().log.level, "debug");
    }

    #[test]
    fn set_value_rejects_wrong_type_and_unknown_key() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            set_config_value(tmp.path(), "focus.default_minutes", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_value(tmp.path(), "focus.colour", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_config_value(tmp.path(), "nodot", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(!config_path(tmp.path()).exists());
    }
}
