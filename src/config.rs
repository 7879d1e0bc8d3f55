use std::path::{Path, PathBuf};

use bevy::prelude::*;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Student Quest, a small 3D platformer")]
pub struct Cli {
    /// Level to start on (file name under the level directory, without `.ron`).
    #[arg(long, value_name = "NAME")]
    pub level: Option<String>,

    /// Game settings file (RON).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Tunables read once at launch. Missing fields fall back to defaults so a
/// partial config file is fine.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub level_dir: PathBuf,
    pub start_level: String,
    pub starting_lives: u32,
    pub mouse_sensitivity: f32,
    /// Seconds between touching the goal and loading the next level.
    pub level_transition_secs: f32,
    /// Pause between hiding the HUD and showing the end panel.
    pub end_panel_delay_secs: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level_dir: PathBuf::from("assets/levels"),
            start_level: "level1".to_string(),
            starting_lives: 3,
            mouse_sensitivity: 6.0,
            level_transition_secs: 10.0,
            end_panel_delay_secs: 1.0,
        }
    }
}

impl GameConfig {
    /// Reads the config file, logging and falling back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match ron::from_str::<GameConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    error!("Failed to parse config {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read config {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Command line flags win over the file.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = cli
            .config
            .as_deref()
            .map(Self::load_or_default)
            .unwrap_or_default();
        if let Some(level) = &cli.level {
            config.start_level = level.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: GameConfig = ron::from_str("(starting_lives: 5)").unwrap();
        assert_eq!(config.starting_lives, 5);
        assert_eq!(config.start_level, "level1");
        assert_eq!(config.level_transition_secs, 10.0);
    }

    #[test]
    fn level_flag_overrides_start_level() {
        let cli = Cli::parse_from(["student-quest", "--level", "level2"]);
        assert_eq!(GameConfig::from_cli(&cli).start_level, "level2");
    }

    #[test]
    fn missing_file_falls_back() {
        let config = GameConfig::load_or_default(Path::new("does/not/exist.ron"));
        assert_eq!(config, GameConfig::default());
    }
}
