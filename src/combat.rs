use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::{
    animation::{Animator, Gait},
    audio::{MoveSound, MoveSoundMode, PlaySound, SoundKind},
    effects::SpawnEffect,
    enemy::EnemyController,
    health::{DamageOutcome, DespawnTimer, Dying, Health},
    physics::TriggerEntered,
    player::{HurtCause, Player, PlayerHurt},
    GameSet,
};

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_projectile_assets)
            .add_observer(on_fire_projectile)
            .add_observer(on_projectile_trigger)
            .add_observer(on_damage_enemy);

        // Strikes resolve after behaviour has queued them and before physics
        // moves anyone, so the damage check sees the same positions the
        // attacker decided on.
        app.add_systems(
            FixedUpdate,
            melee_strike_system
                .in_set(GameSet::Behavior)
                .after(crate::enemy::enemy_behavior_system),
        );
    }
}

// ── Data types ──────────────────────────────────────────────────────────────

pub const PROJECTILE_SPEED: f32 = 9.0;
pub const PROJECTILE_LIFETIME: f32 = 4.0;

/// A straight-flying shot. It is a kinematic sensor: it moves at a fixed
/// velocity, and touching the player or any solid is reported as a trigger.
#[derive(Component, Debug)]
#[require(Sensor)]
pub struct Projectile {
    pub shooter: Entity,
}

/// Asks for a projectile to be spawned. Raised by the shooter behaviour.
#[derive(Event, Debug, Clone, Copy)]
pub struct FireProjectile {
    pub shooter: Entity,
    pub origin: Vec3,
    pub direction: Vec3,
}

/// A melee swing that lands after a short delay, so the hit lines up with the
/// attack clip instead of the moment the decision was made.
#[derive(Component, Debug)]
pub struct PendingStrike(pub Timer);

impl PendingStrike {
    pub fn after(seconds: f32) -> Self {
        Self(Timer::from_seconds(seconds, TimerMode::Once))
    }
}

/// Deal `amount` damage to an enemy.
#[derive(Event, Debug, Clone, Copy)]
pub struct DamageEnemy {
    pub enemy: Entity,
    pub amount: i32,
}

/// Raised when an enemy survives a hit.
#[derive(Event, Debug, Clone, Copy)]
pub struct EnemyHurt {
    pub enemy: Entity,
}

/// Optional look for projectiles. Without it (headless runs) projectiles are
/// still simulated, just not drawn.
#[derive(Resource)]
pub struct ProjectileAssets {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
}

// ── Systems ─────────────────────────────────────────────────────────────────

pub fn setup_projectile_assets(
    mut commands: Commands,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let (Some(mut meshes), Some(mut materials)) = (meshes, materials) else {
        return;
    };
    commands.insert_resource(ProjectileAssets {
        mesh: meshes.add(Sphere::new(0.2)),
        material: materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.35, 0.1),
            emissive: LinearRgba::rgb(2.0, 0.6, 0.1),
            ..default()
        }),
    });
}

pub fn on_fire_projectile(
    trigger: On<FireProjectile>,
    mut commands: Commands,
    assets: Option<Res<ProjectileAssets>>,
) {
    let direction = trigger.direction.normalize_or_zero();
    let mut projectile = commands.spawn((
        Name::new("Projectile"),
        Projectile {
            shooter: trigger.shooter,
        },
        Transform::from_translation(trigger.origin),
        RigidBody::KinematicVelocityBased,
        Velocity::linear(direction * PROJECTILE_SPEED),
        Collider::ball(0.2),
        ActiveEvents::COLLISION_EVENTS,
        // Kinematic-vs-fixed pairs are off by default; projectiles need them
        // to notice level geometry.
        ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_STATIC,
        DespawnTimer::from_seconds(PROJECTILE_LIFETIME),
        crate::level::LevelEntity,
    ));
    if let Some(assets) = assets {
        projectile.insert((
            Mesh3d(assets.mesh.clone()),
            MeshMaterial3d(assets.material.clone()),
        ));
    }
    commands.trigger(PlaySound(SoundKind::Shoot));
}

/// Hitting the player hurts them; hitting anything else solid just stops the
/// shot. Other sensors and the shooter itself are ignored.
pub fn on_projectile_trigger(
    trigger: On<TriggerEntered>,
    mut commands: Commands,
    projectiles: Query<&Projectile>,
    players: Query<(), With<Player>>,
    sensors: Query<(), With<Sensor>>,
) {
    let Ok(projectile) = projectiles.get(trigger.sensor) else {
        return;
    };
    if trigger.other == projectile.shooter || sensors.contains(trigger.other) {
        return;
    }
    if players.contains(trigger.other) {
        commands.trigger(PlayerHurt {
            cause: HurtCause::Projectile,
        });
    }
    commands.entity(trigger.sensor).try_despawn();
}

/// Lands queued melee strikes: the player is hurt when inside the strike
/// sphere in front of the attacker.
pub fn melee_strike_system(
    mut commands: Commands,
    time: Res<Time>,
    mut strikers: Query<(Entity, &Transform, &EnemyController, &mut PendingStrike)>,
    players: Query<&Transform, (With<Player>, Without<EnemyController>)>,
) {
    for (entity, transform, controller, mut strike) in strikers.iter_mut() {
        strike.0.tick(time.delta());
        if !strike.0.is_finished() {
            continue;
        }
        commands.entity(entity).try_remove::<PendingStrike>();
        if controller.dead {
            continue;
        }

        let center = transform.translation + *transform.forward() * controller.attack_distance;
        let hit = players
            .iter()
            .any(|player| player.translation.distance(center) <= controller.attack_area);
        if hit {
            commands.trigger(PlayerHurt {
                cause: HurtCause::Strike,
            });
        }
    }
}

pub fn on_damage_enemy(
    trigger: On<DamageEnemy>,
    mut commands: Commands,
    mut enemies: Query<
        (
            &Transform,
            &mut EnemyController,
            &mut Health,
            &mut RigidBody,
            &mut Velocity,
            &mut Animator,
            &mut MoveSound,
        ),
        Without<Dying>,
    >,
) {
    let Ok((
        transform,
        mut controller,
        mut health,
        mut body,
        mut velocity,
        mut animator,
        mut move_sound,
    )) = enemies.get_mut(trigger.enemy)
    else {
        return;
    };
    let Some(outcome) = controller.take_damage(&mut health, trigger.amount) else {
        return;
    };

    match outcome {
        DamageOutcome::Killed => {
            animator.dead = true;
            animator.set_gait(Gait::Idle);
            // Frozen where it fell; nothing pushes it during the death clip.
            *body = RigidBody::KinematicPositionBased;
            *velocity = Velocity::zero();
            move_sound.mode = MoveSoundMode::Silent;

            for kind in [controller.hit_effect, controller.dead_effect].into_iter().flatten() {
                commands.trigger(SpawnEffect {
                    kind,
                    position: transform.translation,
                });
            }
            commands
                .entity(trigger.enemy)
                .insert((Dying, DespawnTimer::from_seconds(3.0)));
            commands.trigger(PlaySound(SoundKind::EnemyDefeated));
            info!("enemy {:?} defeated", trigger.enemy);
        }
        DamageOutcome::Hurt => {
            animator.play_hit_reaction();
            commands.trigger(EnemyHurt {
                enemy: trigger.enemy,
            });
            commands.trigger(PlaySound(SoundKind::EnemyHit));
        }
    }
}
