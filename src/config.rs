use crate::context::{LayoutConstants, DEFAULT_ZOOM};
use crate::item::Interaction;
use crate::model::Range;
use crate::storage::project_dirs;
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_FILE_NAME: &str = "config.yml";

/// User settings, read from `config.yml` in the platform config directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub range: Range,
    pub zoom: u32,
    /// Whether bars move when dragged or open their details when clicked
    pub interaction: InteractionMode,
    /// Numeric metadata key used as the weight when a feature has none
    pub weight_key: Option<String>,
    pub layout: LayoutConstants,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    Drag,
    Click,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            range: Range::Monthly,
            zoom: DEFAULT_ZOOM,
            interaction: InteractionMode::Drag,
            weight_key: None,
            layout: LayoutConstants::terminal(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<(Self, ConfigSource)> {
        Self::load_from(&config_file_path()?)
    }

    /// A missing file means defaults. Loading happens before the logger
    /// exists, so the source is handed back for the caller to report.
    pub fn load_from(path: &Path) -> Result<(Self, ConfigSource)> {
        if !path.exists() {
            return Ok((Config::default(), ConfigSource::Defaults(path.to_path_buf())));
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config: Config = serde_yaml::from_str(&data).context("parsing config file")?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn interaction(&self) -> Interaction {
        match self.interaction {
            InteractionMode::Drag => Interaction::from_handlers(true, false),
            InteractionMode::Click => Interaction::from_handlers(false, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "config loaded from {}", path.display()),
            ConfigSource::Defaults(path) => {
                write!(f, "no config at {}, using defaults", path.display())
            }
        }
    }
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let config: Config = serde_yaml::from_str("range: weekly\ninteraction: click\n").unwrap();
        assert_eq!(config.range, Range::Weekly);
        assert_eq!(config.zoom, DEFAULT_ZOOM);
        assert_eq!(config.interaction(), Interaction::Click);
        assert_eq!(config.layout, LayoutConstants::terminal());
    }

    #[test]
    fn unknown_log_levels_fall_back_to_info() {
        let mut config = Config::default();
        config.log_level = "trace".into();
        assert_eq!(config.level_filter(), LevelFilter::Trace);
        config.log_level = "chatty".into();
        assert_eq!(config.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("ganttline-no-such-config.yml");
        let (config, source) = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(source, ConfigSource::Defaults(path.clone()));
        assert!(source.to_string().starts_with("no config at"));
    }

    #[test]
    fn loaded_files_report_where_they_came_from() {
        let path = std::env::temp_dir().join(format!(
            "ganttline-config-{}.yml",
            std::process::id()
        ));
        fs::write(&path, "zoom: 150\n").unwrap();
        let (config, source) = Config::load_from(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.zoom, 150);
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(
            source.to_string(),
            format!("config loaded from {}", path.display())
        );
    }
}
