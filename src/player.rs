use bevy::prelude::*;
use bevy_rapier3d::prelude::{RigidBody, Velocity};

use crate::{
    audio::{PlaySound, SoundKind},
    breakable::{Breakable, HitBlock},
    camera::CameraRig,
    combat::DamageEnemy,
    enemy::EnemyController,
    level::LoadLevel,
    physics::{Collided, Grounded},
    resources::{GameSession, LifeLost},
    ui::PauseState,
    GameSet,
};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (player_input_system, invulnerability_system).in_set(GameSet::Input),
        )
        .add_systems(FixedUpdate, fall_out_system.in_set(GameSet::Behavior))
        .add_observer(on_player_collided)
        .add_observer(on_player_hurt)
        .add_observer(on_stop_player);
    }
}

#[derive(Component)]
#[require(RigidBody, Velocity, Grounded)]
pub struct Player;

#[derive(Component, Debug)]
pub struct PlayerController {
    pub move_speed: f32,
    pub jump_speed: f32,
    /// Upward speed after landing on an enemy.
    pub stomp_bounce: f32,
    /// Falling below this height costs a life.
    pub fall_limit: f32,
    pub spawn_point: Vec3,
    /// Set once the level is finished; input is ignored from then on.
    pub stopped: bool,
    invulnerable: Option<Timer>,
}

impl PlayerController {
    pub const INVULNERABLE_SECS: f32 = 2.0;

    pub fn new(spawn_point: Vec3, fall_limit: f32) -> Self {
        Self {
            move_speed: 6.0,
            jump_speed: 8.0,
            stomp_bounce: 6.0,
            fall_limit,
            spawn_point,
            stopped: false,
            invulnerable: None,
        }
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable.is_some()
    }

    pub fn grant_invulnerability(&mut self) {
        self.invulnerable = Some(Timer::from_seconds(
            Self::INVULNERABLE_SECS,
            TimerMode::Once,
        ));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HurtCause {
    Enemy,
    Projectile,
    Strike,
    Fall,
    TimeUp,
}

impl HurtCause {
    /// Falling out of the world and running out of time ignore invulnerability.
    fn is_unavoidable(self) -> bool {
        matches!(self, HurtCause::Fall | HurtCause::TimeUp)
    }
}

/// The player loses a life and goes back to the spawn point.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerHurt {
    pub cause: HurtCause,
}

/// Freeze the player in place (end of level).
#[derive(Event, Debug, Clone, Copy)]
pub struct StopPlayer;

/// Camera-relative movement: W/S along the camera's flat forward, A/D along
/// its right. Space jumps when grounded. Nothing is read while paused.
pub fn player_input_system(
    keyboard: Res<ButtonInput<KeyCode>>,
    pause: Option<Res<PauseState>>,
    rigs: Query<&CameraRig>,
    mut players: Query<
        (&mut Transform, &mut Velocity, &mut Grounded, &PlayerController),
        With<Player>,
    >,
    mut commands: Commands,
) {
    if pause.is_some_and(|pause| pause.paused) {
        return;
    }
    let Ok((mut transform, mut velocity, mut grounded, controller)) = players.single_mut() else {
        return;
    };
    if controller.stopped {
        return;
    }

    let (forward, right) = rigs
        .iter()
        .next()
        .map(|rig| (rig.flat_forward(), rig.flat_right()))
        .unwrap_or((Vec3::NEG_Z, Vec3::X));

    let mut input = Vec3::ZERO;
    if keyboard.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]) {
        input += forward;
    }
    if keyboard.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]) {
        input -= forward;
    }
    if keyboard.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]) {
        input += right;
    }
    if keyboard.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]) {
        input -= right;
    }

    let horizontal = input.normalize_or_zero() * controller.move_speed;
    velocity.linear.x = horizontal.x;
    velocity.linear.z = horizontal.z;
    if horizontal.length_squared() > 0.0 {
        transform.look_to(horizontal, Vec3::Y);
    }

    if grounded.0 && keyboard.just_pressed(KeyCode::Space) {
        velocity.linear.y = controller.jump_speed;
        grounded.0 = false;
        commands.trigger(PlaySound(SoundKind::Jump));
    }
}

/// Counts invulnerability down and blinks the player while it lasts.
pub fn invulnerability_system(
    time: Res<Time>,
    mut players: Query<(&mut PlayerController, &mut Visibility), With<Player>>,
) {
    for (mut controller, mut visibility) in players.iter_mut() {
        let finished = controller
            .invulnerable
            .as_mut()
            .is_some_and(|timer| timer.tick(time.delta()).is_finished());

        let next = match &controller.invulnerable {
            Some(_) if finished => Visibility::Inherited,
            Some(timer) if (timer.elapsed_secs() * 10.0) as u32 % 2 == 0 => Visibility::Hidden,
            _ => Visibility::Inherited,
        };
        if finished {
            controller.invulnerable = None;
        }
        visibility.set_if_neq(next);
    }
}

pub fn fall_out_system(
    mut commands: Commands,
    players: Query<(&Transform, &PlayerController), With<Player>>,
) {
    for (transform, controller) in players.iter() {
        if transform.translation.y < controller.fall_limit {
            commands.trigger(PlayerHurt {
                cause: HurtCause::Fall,
            });
        }
    }
}

/// Landing on an enemy damages it; any other enemy contact hurts the player.
/// Bumping a breakable from below hits it.
pub fn on_player_collided(
    trigger: On<Collided>,
    mut commands: Commands,
    mut players: Query<(&mut Velocity, &PlayerController), With<Player>>,
    enemies: Query<&EnemyController>,
    blocks: Query<(), With<Breakable>>,
) {
    let Ok((mut velocity, controller)) = players.get_mut(trigger.entity) else {
        return;
    };

    if let Ok(enemy) = enemies.get(trigger.other) {
        if enemy.dead {
            return;
        }
        if trigger.normal.y > 0.5 {
            commands.trigger(DamageEnemy {
                enemy: trigger.other,
                amount: enemy.damage,
            });
            velocity.linear.y = controller.stomp_bounce;
            commands.trigger(PlaySound(SoundKind::Stomp));
        } else {
            commands.trigger(PlayerHurt {
                cause: HurtCause::Enemy,
            });
        }
        return;
    }

    if trigger.normal.y < -0.5 && blocks.get(trigger.other).is_ok() {
        commands.trigger(HitBlock {
            block: trigger.other,
        });
    }
}

pub fn on_player_hurt(
    trigger: On<PlayerHurt>,
    mut commands: Commands,
    mut session: ResMut<GameSession>,
    mut players: Query<(&mut Transform, &mut Velocity, &mut PlayerController), With<Player>>,
) {
    let Ok((mut transform, mut velocity, mut controller)) = players.single_mut() else {
        return;
    };
    if controller.stopped {
        return;
    }
    if controller.is_invulnerable() && !trigger.cause.is_unavoidable() {
        return;
    }

    match session.lose_life() {
        LifeLost::Remaining(lives) => {
            info!("player hurt ({:?}), {} lives left", trigger.cause, lives);
            transform.translation = controller.spawn_point;
            *velocity = Velocity::zero();
            controller.grant_invulnerability();
            if trigger.cause == HurtCause::TimeUp {
                session.restart_timer();
            }
            commands.trigger(PlaySound(SoundKind::Hurt));
        }
        LifeLost::GameOver => {
            warn!("game over ({:?}), restarting {}", trigger.cause, session.level);
            session.reset_lives();
            commands.trigger(LoadLevel {
                name: session.level.clone(),
            });
        }
    }
}

pub fn on_stop_player(
    _trigger: On<StopPlayer>,
    mut players: Query<(&mut Velocity, &mut PlayerController), With<Player>>,
) {
    for (mut velocity, mut controller) in players.iter_mut() {
        controller.stopped = true;
        velocity.linear.x = 0.0;
        velocity.linear.z = 0.0;
    }
}
