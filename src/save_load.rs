use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::resources::LevelSummary;

pub struct SaveLoadPlugin;

impl Plugin for SaveLoadPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_save_data);
    }
}

/// Progress kept between runs.
///
/// Every field is `#[serde(default)]` so a save written by an older build
/// still loads; missing fields get their default instead of a parse error.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SaveData {
    /// Best result per level name.
    #[serde(default)]
    pub levels: BTreeMap<String, LevelRecord>,
    /// Furthest level reached. Empty until a level is completed.
    #[serde(default)]
    pub unlocked_level: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelRecord {
    #[serde(default)]
    pub best_percentage: u32,
    /// Fastest completion in seconds.
    #[serde(default)]
    pub best_time: f32,
}

impl SaveData {
    /// Fold a finished level into the records. Returns true when either the
    /// percentage or the time is a new best.
    pub fn record(&mut self, level: &str, summary: &LevelSummary, next_level: &str) -> bool {
        if !next_level.is_empty() {
            self.unlocked_level = next_level.to_string();
        }

        let time = summary.time_taken;
        match self.levels.get_mut(level) {
            None => {
                self.levels.insert(
                    level.to_string(),
                    LevelRecord {
                        best_percentage: summary.percentage,
                        best_time: time,
                    },
                );
                true
            }
            Some(record) => {
                let mut improved = false;
                if summary.percentage > record.best_percentage {
                    record.best_percentage = summary.percentage;
                    improved = true;
                }
                if time < record.best_time {
                    record.best_time = time;
                    improved = true;
                }
                improved
            }
        }
    }

    pub fn best(&self, level: &str) -> Option<LevelRecord> {
        self.levels.get(level).copied()
    }
}

// =============================================================================
// Storage backend: native. The save lives in the per-user data directory
// (`dirs::data_dir()`), e.g. ~/.local/share/student-quest/save.ron on Linux.
// =============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod storage {
    use super::SaveData;
    use bevy::prelude::*;

    fn save_file_path() -> Option<std::path::PathBuf> {
        Some(dirs::data_dir()?.join("student-quest").join("save.ron"))
    }

    pub fn load() -> Option<SaveData> {
        let path = save_file_path()?;

        if !path.exists() {
            info!("No save file found at {:?}. Starting fresh.", path);
            return None;
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match ron::from_str::<SaveData>(&contents) {
                Ok(data) => {
                    info!("Loaded save data from {:?}: {:?}", path, data);
                    Some(data)
                }
                Err(e) => {
                    // Corrupt or outdated file: keep playing on defaults.
                    error!("Failed to parse save file: {}. Using defaults.", e);
                    None
                }
            },
            Err(e) => {
                error!("Failed to read save file: {}. Using defaults.", e);
                None
            }
        }
    }

    pub fn save(save_data: &SaveData) {
        let Some(path) = save_file_path() else {
            error!("Could not determine save file path!");
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create save directory: {}", e);
                return;
            }
        }

        let pretty = ron::ser::PrettyConfig::default();
        match ron::ser::to_string_pretty(save_data, pretty) {
            Ok(serialized) => {
                if let Err(e) = std::fs::write(&path, serialized) {
                    error!("Failed to write save file: {}", e);
                } else {
                    info!("Game saved to {:?}", path);
                }
            }
            Err(e) => error!("Failed to serialize save data: {}", e),
        }
    }
}

// =============================================================================
// Storage backend: WASM. Browsers have no filesystem; progress is kept for
// the session only.
// =============================================================================

#[cfg(target_arch = "wasm32")]
mod storage {
    use super::SaveData;
    use bevy::prelude::*;

    pub fn load() -> Option<SaveData> {
        // TODO: back this with localStorage through web-sys once there is a web build.
        warn!("WASM save/load not yet implemented. Using defaults.");
        None
    }

    pub fn save(_save_data: &SaveData) {
        warn!("WASM save/load not yet implemented.");
    }
}

fn load_save_data(mut commands: Commands) {
    let save_data = storage::load().unwrap_or_default();
    commands.insert_resource(save_data);
}

/// Plain function, not a system: called once per finished level.
pub fn save_to_disk(save_data: &SaveData) {
    storage::save(save_data);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(percentage: u32, time_taken: f32) -> LevelSummary {
        LevelSummary {
            coins: (0, 0),
            red_coins: (0, 0),
            bricks: (0, 0),
            golden_blocks: (0, 0),
            time_taken,
            percentage,
        }
    }

    #[test]
    fn keeps_best_of_each_field() {
        let mut save = SaveData::default();
        assert!(save.record("level1", &summary(50, 90.0), "level2"));
        assert!(save.record("level1", &summary(40, 70.0), "level2"));
        assert!(!save.record("level1", &summary(30, 95.0), "level2"));

        let best = save.best("level1").unwrap();
        assert_eq!(best.best_percentage, 50);
        assert_eq!(best.best_time, 70.0);
        assert_eq!(save.unlocked_level, "level2");
    }

    #[test]
    fn old_save_without_fields_still_parses() {
        let save: SaveData = ron::from_str("()").unwrap();
        assert_eq!(save, SaveData::default());
    }
}
