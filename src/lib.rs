// lib.rs - Student Quest: a small 3D platformer.
//
// Each module owns one piece of the game and exposes a Plugin. They talk to
// each other through global observer events (HitBlock, PlayerHurt,
// ShowEndGame, ...) and the GameSession resource, never by reaching into
// another module's entities.

use bevy::prelude::*;

pub mod animation;
pub mod audio;
pub mod breakable;
pub mod camera;
pub mod combat;
pub mod config;
pub mod effects;
pub mod enemy;
pub mod goal;
pub mod health;
pub mod level;
pub mod physics;
pub mod pickups;
pub mod player;
pub mod resources;
pub mod save_load;
pub mod ui;

use crate::{
    config::{Cli, GameConfig},
    resources::GameSession,
};

/// Title overlay until the first key press, then play. Never goes back:
/// reloading a level keeps the game started.
#[derive(States, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GamePhase {
    #[default]
    Title,
    Playing,
}

/// Frame ordering shared by every plugin. In `FixedUpdate` behaviour decides
/// and rapier moves bodies afterwards in `FixedPostUpdate`; in `Update` input
/// is read before anything is drawn.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameSet {
    Input,
    Behavior,
    Presentation,
}

/// Command line flags handed over from `main`; read once the log is up.
#[derive(Resource, Debug, Clone, Default)]
pub struct LaunchArgs(pub Cli);

#[derive(Default)]
pub struct StudentQuestPlugin {
    pub cli: Cli,
}

impl Plugin for StudentQuestPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GamePhase>()
            .insert_resource(LaunchArgs(self.cli.clone()))
            .init_resource::<GameConfig>()
            .init_resource::<GameSession>()
            .add_systems(PreStartup, apply_launch_config)
            .configure_sets(
                FixedUpdate,
                (GameSet::Input, GameSet::Behavior)
                    .chain()
                    .run_if(in_state(GamePhase::Playing)),
            )
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Behavior, GameSet::Presentation).chain(),
            )
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Behavior).run_if(in_state(GamePhase::Playing)),
            )
            .add_plugins((
                physics::PhysicsPlugin,
                animation::AnimationPlugin,
                health::HealthPlugin,
                audio::GameAudioPlugin,
                effects::EffectsPlugin,
                breakable::BreakablePlugin,
                enemy::EnemyPlugin,
                combat::CombatPlugin,
                player::PlayerPlugin,
                camera::CameraPlugin,
                pickups::PickupsPlugin,
            ))
            .add_plugins((
                goal::GoalPlugin,
                level::LevelPlugin,
                ui::UiPlugin,
                save_load::SaveLoadPlugin,
            ));
    }
}

/// Resolves `--config` and `--level` into the config resource and starts the
/// session with the configured number of lives.
fn apply_launch_config(mut commands: Commands, args: Res<LaunchArgs>) {
    let config = GameConfig::from_cli(&args.0);
    commands.insert_resource(GameSession::new(config.starting_lives));
    commands.insert_resource(config);
}
