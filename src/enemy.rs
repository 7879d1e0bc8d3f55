use bevy::prelude::*;
use bevy_rapier3d::prelude::{ExternalImpulse, PhysicsSet, ReadRapierContext, Velocity};
use serde::{Deserialize, Serialize};

use crate::{
    animation::{Animator, Gait},
    audio::{MoveSound, MoveSoundMode},
    combat::{FireProjectile, PendingStrike},
    effects::EffectKind,
    health::{DamageOutcome, Health},
    physics::{ground_below, Collided},
    player::Player,
    GameSet,
};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        // Waypoints are snapped once rapier has stepped with the new level's
        // colliders, so the ray has something to hit.
        app.add_systems(FixedUpdate, enemy_behavior_system.in_set(GameSet::Behavior))
            .add_systems(
                FixedPostUpdate,
                snap_waypoints_system.after(PhysicsSet::Writeback),
            )
            .add_observer(on_enemy_collided);
    }
}

/// Which behaviour an enemy runs while the player is (or is not) around.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Stands still and makes no sound.
    #[default]
    None,
    /// Walks its waypoint loop and never looks for the player.
    Patrol,
    /// Patrols, and while the player is in range turns to face them and fires.
    Shoot,
    /// Patrols, and while the player is in range charges straight at them.
    Tackle,
    /// Patrols, charges, and strikes once close enough.
    Attacker,
}

/// Closed loop of world-space points.
#[derive(Clone, Debug, Default)]
pub struct PatrolRoute {
    pub points: Vec<Vec3>,
    current: usize,
}

impl PatrolRoute {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points, current: 0 }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_point(&self) -> Option<Vec3> {
        self.points.get(self.current).copied()
    }

    pub fn advance(&mut self) {
        if self.points.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.points.len();
    }
}

#[derive(Component, Clone, Debug)]
#[require(Animator, MoveSound, Velocity, ExternalImpulse)]
pub struct EnemyController {
    pub kind: EnemyKind,
    /// Damage taken each time the player lands on it.
    pub damage: i32,
    pub route: PatrolRoute,
    pub waypoint_min_dist: f32,
    pub speed: f32,
    pub rotation_speed: f32,
    /// Seconds the enemy stops driving itself after taking a hit.
    pub stop_on_hit: f32,
    pub hit_force: f32,
    pub detection_radius: f32,
    pub shoot_interval: f32,
    pub projectile_spawn: Vec3,
    pub tackle_speed: f32,
    pub attack_distance: f32,
    pub attack_area: f32,
    pub attack_stop_time: f32,
    pub damage_delay: f32,
    pub hit_effect: Option<EffectKind>,
    pub dead_effect: Option<EffectKind>,
    pub y_dead_zone: f32,
    pub dead: bool,
    stun: f32,
    last_shot: f32,
    first_shot: bool,
}

impl Default for EnemyController {
    fn default() -> Self {
        Self {
            kind: EnemyKind::None,
            damage: 1,
            route: PatrolRoute::default(),
            waypoint_min_dist: 0.5,
            speed: 2.0,
            rotation_speed: 20.0,
            stop_on_hit: 1.0,
            hit_force: 15.0,
            detection_radius: 10.0,
            shoot_interval: 2.0,
            projectile_spawn: Vec3::new(0.0, 0.3, -0.8),
            tackle_speed: 6.0,
            attack_distance: 2.0,
            attack_area: 2.0,
            attack_stop_time: 2.0,
            damage_delay: 0.15,
            hit_effect: Some(EffectKind::Spark),
            dead_effect: Some(EffectKind::Smoke),
            y_dead_zone: -100.0,
            dead: false,
            stun: 0.0,
            last_shot: 0.0,
            first_shot: true,
        }
    }
}

/// What the enemy knows about the world this tick.
#[derive(Clone, Copy, Debug)]
pub struct Perception {
    pub position: Vec3,
    pub forward: Vec3,
    pub player: Option<Vec3>,
    pub in_hit_reaction: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Locomotion {
    #[default]
    Keep,
    /// One tick of acceleration along the vector.
    Accelerate(Vec3),
    SetVelocity(Vec3),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Facing {
    pub direction: Vec3,
    /// Interpolation rate per second toward `direction`.
    pub rate: f32,
}

/// Everything one behaviour step asks the body, animator and audio to do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BehaviorTick {
    pub locomotion: Locomotion,
    pub facing: Option<Facing>,
    pub gait: Option<Gait>,
    pub sound: Option<MoveSoundMode>,
    pub play_attack: bool,
    pub fire_projectile: bool,
    pub melee_strike: bool,
}

impl EnemyController {
    pub fn new(kind: EnemyKind) -> Self {
        Self {
            kind,
            ..default()
        }
    }

    pub fn with_route(mut self, points: Vec<Vec3>) -> Self {
        self.route = PatrolRoute::new(points);
        self
    }

    pub fn stun_remaining(&self) -> f32 {
        self.stun
    }

    /// One physics step of behaviour selection. `now` is the fixed clock's
    /// elapsed time, `dt` the fixed delta.
    pub fn tick(&mut self, perception: &Perception, now: f32, dt: f32) -> BehaviorTick {
        let mut out = BehaviorTick::default();
        if self.dead {
            return out;
        }
        if self.kind == EnemyKind::None {
            out.sound = Some(MoveSoundMode::Silent);
            return out;
        }

        let detected = match self.kind {
            EnemyKind::Patrol => None,
            _ => perception
                .player
                .filter(|player| player.distance(perception.position) <= self.detection_radius),
        };

        let Some(player) = detected else {
            if self.kind != EnemyKind::Patrol {
                self.first_shot = true;
            }
            self.patrol(perception, dt, &mut out);
            return out;
        };

        let mut to_player = player - perception.position;
        to_player.y = 0.0;
        out.facing = Some(Facing {
            direction: to_player,
            rate: self.rotation_speed * 2.0,
        });

        match self.kind {
            EnemyKind::Shoot => {
                if now - self.last_shot > self.shoot_interval {
                    // The first interval after spotting the player is a wind-up.
                    if !self.first_shot {
                        out.fire_projectile = true;
                        out.play_attack = true;
                    }
                    self.first_shot = false;
                    out.gait = Some(Gait::Idle);
                    out.sound = Some(MoveSoundMode::Silent);
                    self.last_shot = now;
                }
            }
            EnemyKind::Tackle => self.charge(perception.forward, dt, &mut out),
            EnemyKind::Attacker => {
                if perception.in_hit_reaction {
                    return out;
                }
                if player.distance(perception.position) > self.attack_distance {
                    self.charge(perception.forward, dt, &mut out);
                } else if now - self.last_shot > self.shoot_interval {
                    out.locomotion = Locomotion::SetVelocity(Vec3::ZERO);
                    out.melee_strike = true;
                    self.stun = self.attack_stop_time;
                    out.gait = Some(Gait::Idle);
                    out.play_attack = true;
                    out.sound = Some(MoveSoundMode::Silent);
                    self.last_shot = now;
                }
            }
            EnemyKind::None | EnemyKind::Patrol => {}
        }
        out
    }

    fn charge(&mut self, forward: Vec3, dt: f32, out: &mut BehaviorTick) {
        if self.stun <= 0.0 {
            out.locomotion = Locomotion::Accelerate(forward * self.tackle_speed);
        } else {
            self.stun -= dt;
        }
        out.gait = Some(Gait::Run);
        out.sound = Some(MoveSoundMode::Tackle);
    }

    fn patrol(&mut self, perception: &Perception, dt: f32, out: &mut BehaviorTick) {
        let Some(waypoint) = self.route.current_point() else {
            out.gait = Some(Gait::Idle);
            out.sound = Some(MoveSoundMode::Silent);
            return;
        };
        out.gait = Some(Gait::Walk);
        out.sound = Some(MoveSoundMode::Walk);

        if self.stun <= 0.0 {
            let mut ahead = perception.forward;
            ahead.y = 0.0;
            out.locomotion =
                Locomotion::SetVelocity(Vec3::NEG_Y * 9.0 + ahead.normalize_or_zero() * self.speed);
        } else {
            self.stun -= dt;
        }

        let mut direction = waypoint - perception.position;
        direction.y = 0.0;
        if direction.length() < self.waypoint_min_dist {
            self.route.advance();
        }
        out.facing = Some(Facing {
            direction,
            rate: self.rotation_speed,
        });
    }

    /// Applies damage unless already dead. A surviving enemy stops driving
    /// itself for `stop_on_hit` seconds.
    pub fn take_damage(&mut self, health: &mut Health, amount: i32) -> Option<DamageOutcome> {
        if self.dead {
            return None;
        }
        let outcome = health.take(amount);
        match outcome {
            DamageOutcome::Killed => self.dead = true,
            DamageOutcome::Hurt => self.stun = self.stop_on_hit,
        }
        Some(outcome)
    }
}

/// Turns `rotation` toward `direction` (flattened, -Z forward) by `t`.
pub fn turn_towards(rotation: Quat, direction: Vec3, t: f32) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < 1e-6 {
        return rotation;
    }
    let target = Transform::IDENTITY.looking_to(flat, Vec3::Y).rotation;
    rotation.slerp(target, t.clamp(0.0, 1.0))
}

/// Waypoints are authored roughly; drop each onto the floor below it.
pub fn snap_waypoints_system(
    rapier: ReadRapierContext,
    mut enemies: Query<&mut EnemyController, Added<EnemyController>>,
) {
    if enemies.is_empty() {
        return;
    }
    let Ok(context) = rapier.single() else {
        return;
    };

    for mut controller in enemies.iter_mut() {
        for point in controller.route.points.iter_mut() {
            if let Some(top) = ground_below(&context, *point) {
                point.y = top + 0.5;
            }
        }
    }
}

pub fn enemy_behavior_system(
    mut commands: Commands,
    time: Res<Time>,
    mut enemies: Query<
        (
            Entity,
            &mut Transform,
            &mut Velocity,
            &mut EnemyController,
            &mut Animator,
            &mut MoveSound,
        ),
        Without<Player>,
    >,
    players: Query<&Transform, With<Player>>,
) {
    let now = time.elapsed_secs();
    let dt = time.delta_secs();
    let player = players.iter().next().map(|transform| transform.translation);

    for (entity, mut transform, mut velocity, mut controller, mut animator, mut move_sound) in
        enemies.iter_mut()
    {
        if transform.translation.y < controller.y_dead_zone {
            commands.entity(entity).try_despawn();
            continue;
        }

        let perception = Perception {
            position: transform.translation,
            forward: *transform.forward(),
            player,
            in_hit_reaction: animator.in_hit_reaction(),
        };
        let tick = controller.tick(&perception, now, dt);

        match tick.locomotion {
            Locomotion::Keep => {}
            Locomotion::Accelerate(acceleration) => velocity.linear += acceleration * dt,
            Locomotion::SetVelocity(target) => velocity.linear = target,
        }
        if let Some(facing) = tick.facing {
            transform.rotation = turn_towards(transform.rotation, facing.direction, facing.rate * dt);
        }
        if let Some(gait) = tick.gait {
            animator.set_gait(gait);
        }
        if tick.play_attack {
            animator.play_attack();
        }
        if let Some(mode) = tick.sound {
            if move_sound.mode != mode {
                move_sound.mode = mode;
            }
        }
        if tick.fire_projectile {
            commands.trigger(FireProjectile {
                shooter: entity,
                origin: transform.transform_point(controller.projectile_spawn),
                direction: *transform.forward(),
            });
        }
        if tick.melee_strike {
            commands
                .entity(entity)
                .insert(PendingStrike::after(controller.damage_delay));
        }
    }
}

/// Bumping into the player knocks the enemy back along the contact normal.
pub fn on_enemy_collided(
    trigger: On<Collided>,
    players: Query<(), With<Player>>,
    mut enemies: Query<(&EnemyController, &mut ExternalImpulse)>,
) {
    if players.get(trigger.other).is_err() {
        return;
    }
    let Ok((controller, mut impulse)) = enemies.get_mut(trigger.entity) else {
        return;
    };
    if controller.dead {
        return;
    }
    impulse.impulse += trigger.normal * controller.hit_force;
}
