use bevy::prelude::*;
use bevy_rapier3d::prelude::Sensor;

use crate::{
    audio::{PlaySound, SoundKind},
    config::GameConfig,
    level::LoadLevel,
    physics::TriggerEntered,
    player::Player,
    resources::GameSession,
    ui::ShowEndGame,
};

pub struct GoalPlugin;

impl Plugin for GoalPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                raise_flag_system,
                level_transition_system.run_if(resource_exists::<LevelTransition>),
            ),
        )
        .add_observer(on_goal_entered);
    }
}

/// End-of-level trigger. Only the first player entry counts.
#[derive(Component, Debug)]
#[require(Sensor)]
pub struct EndGamePoint {
    pub level_to_load: String,
    active: bool,
}

impl EndGamePoint {
    pub fn new(level_to_load: impl Into<String>) -> Self {
        Self {
            level_to_load: level_to_load.into(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Flag on the goal pole, raised once the goal is reached.
#[derive(Component, Debug, Default)]
pub struct GoalFlag {
    pub raised: bool,
}

impl GoalFlag {
    pub const LOWERED: f32 = -1.0;
    pub const RAISED: f32 = 1.2;
    pub const SPEED: f32 = 1.5;
}

/// Counts down to the next level load. Inserted when the goal is reached.
#[derive(Resource, Debug)]
pub struct LevelTransition {
    pub timer: Timer,
    pub level_to_load: String,
}

pub fn on_goal_entered(
    trigger: On<TriggerEntered>,
    mut commands: Commands,
    mut goals: Query<&mut EndGamePoint>,
    players: Query<(), With<Player>>,
    mut flags: Query<(&ChildOf, &mut GoalFlag)>,
    mut session: ResMut<GameSession>,
    config: Option<Res<GameConfig>>,
) {
    let Ok(mut goal) = goals.get_mut(trigger.sensor) else {
        return;
    };
    if goal.active || players.get(trigger.other).is_err() {
        return;
    }
    goal.active = true;

    for (child_of, mut flag) in flags.iter_mut() {
        if child_of.parent() == trigger.sensor {
            flag.raised = true;
        }
    }
    commands.trigger(PlaySound(SoundKind::LevelComplete));
    session.stop_timer();
    commands.trigger(ShowEndGame {
        next_level: goal.level_to_load.clone(),
    });

    let delay = config
        .map(|config| config.level_transition_secs)
        .unwrap_or_else(|| GameConfig::default().level_transition_secs);
    info!("Reached the goal of {}, next level in {}s", session.level, delay);
    commands.insert_resource(LevelTransition {
        timer: Timer::from_seconds(delay, TimerMode::Once),
        level_to_load: goal.level_to_load.clone(),
    });
}

pub fn raise_flag_system(time: Res<Time>, mut flags: Query<(&GoalFlag, &mut Transform)>) {
    for (flag, mut transform) in flags.iter_mut() {
        if flag.raised && transform.translation.y < GoalFlag::RAISED {
            transform.translation.y =
                (transform.translation.y + GoalFlag::SPEED * time.delta_secs()).min(GoalFlag::RAISED);
        }
    }
}

pub fn level_transition_system(
    mut commands: Commands,
    time: Res<Time>,
    mut transition: ResMut<LevelTransition>,
) {
    if !transition.timer.tick(time.delta()).just_finished() {
        return;
    }
    commands.remove_resource::<LevelTransition>();

    if transition.level_to_load.is_empty() {
        warn!("No level specified to load.");
        return;
    }
    commands.trigger(LoadLevel {
        name: transition.level_to_load.clone(),
    });
}
