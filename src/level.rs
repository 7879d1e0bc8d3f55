use std::{
    fmt,
    path::{Path, PathBuf},
};

use bevy::{ecs::entity_disabling::Disabled, prelude::*};
use bevy_rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    animation::AnimatedBody,
    audio::MoveSound,
    breakable::Breakable,
    camera::{spawn_camera, CameraRig, CameraZone, OffsetTransition, RotateTransition},
    config::GameConfig,
    effects::EffectKind,
    enemy::{EnemyController, EnemyKind},
    goal::{EndGamePoint, GoalFlag, LevelTransition},
    health::Health,
    physics::{cuboid, GroundProbe},
    pickups::{Coin, Spin},
    player::{HurtCause, Player, PlayerController, PlayerHurt},
    resources::{GameSession, LevelTotals},
};

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        // The first level configures the camera rig, so the rig must exist.
        app.add_systems(
            Startup,
            (setup_level_assets, load_start_level)
                .chain()
                .after(spawn_camera),
        )
            .add_systems(
                Update,
                session_clock_system.in_set(crate::GameSet::Behavior),
            )
            .add_observer(on_load_level);
    }
}

/// Everything spawned for the current level. Despawned wholesale on reload.
#[derive(Component, Debug, Default)]
pub struct LevelEntity;

/// Replace the current level with `assets/levels/<name>.ron`.
#[derive(Event, Debug, Clone)]
pub struct LoadLevel {
    pub name: String,
}

/// Raised once the new level is spawned and the session reset.
#[derive(Event, Debug, Clone)]
pub struct LevelLoaded {
    pub name: String,
}

// ── Level file format ───────────────────────────────────────────────────────

/// Level file contents. Positions are `[x, y, z]`; sizes are full extents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LevelDefinition {
    #[serde(default = "default_time_limit")]
    pub time_limit: f32,
    pub player_spawn: [f32; 3],
    /// Falling below this height costs a life.
    #[serde(default = "default_fall_limit")]
    pub fall_limit: f32,
    #[serde(default)]
    pub camera: CameraDefaults,
    #[serde(default)]
    pub platforms: Vec<PlatformDef>,
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
    #[serde(default)]
    pub coins: Vec<CoinDef>,
    #[serde(default)]
    pub enemies: Vec<EnemyDef>,
    #[serde(default)]
    pub camera_zones: Vec<CameraZoneDef>,
    #[serde(default)]
    pub goal: Option<GoalDef>,
}

fn default_time_limit() -> f32 {
    300.0
}

fn default_fall_limit() -> f32 {
    -20.0
}

fn default_one() -> i32 {
    1
}

fn default_coin_value() -> u32 {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CameraDefaults {
    /// (pitch, yaw, roll) in degrees.
    pub rotation: [f32; 3],
    pub distance: f32,
    pub height: f32,
    pub offset: [f32; 3],
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            rotation: [20.0, 0.0, 0.0],
            distance: 20.0,
            height: 1.0,
            offset: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlatformDef {
    pub position: [f32; 3],
    pub size: [f32; 3],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlockDef {
    pub position: [f32; 3],
    #[serde(default = "default_one")]
    pub health: i32,
    #[serde(default)]
    pub destroy: bool,
    #[serde(default)]
    pub adds_life: bool,
    #[serde(default)]
    pub coins: u32,
    #[serde(default)]
    pub hit_effect: Option<EffectKind>,
    #[serde(default)]
    pub break_effect: Option<EffectKind>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoinDef {
    pub position: [f32; 3],
    #[serde(default)]
    pub red: bool,
    #[serde(default = "default_coin_value")]
    pub value: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnemyDef {
    pub position: [f32; 3],
    #[serde(default)]
    pub kind: EnemyKind,
    #[serde(default = "default_one")]
    pub health: i32,
    /// Damage taken per stomp.
    #[serde(default = "default_one")]
    pub damage: i32,
    #[serde(default)]
    pub waypoints: Vec<[f32; 3]>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub detection_radius: Option<f32>,
    #[serde(default)]
    pub shoot_interval: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CameraZoneDef {
    pub position: [f32; 3],
    pub size: [f32; 3],
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub offset: Option<[f32; 3]>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GoalDef {
    pub position: [f32; 3],
    /// Empty means this is the last level.
    #[serde(default)]
    pub next_level: String,
}

impl LevelDefinition {
    pub fn totals(&self) -> LevelTotals {
        let mut totals = LevelTotals::default();
        for coin in &self.coins {
            if coin.red {
                totals.red_coins += 1;
            } else {
                totals.coins += coin.value;
            }
        }
        for block in &self.blocks {
            if block.adds_life {
                totals.golden_blocks += 1;
            } else {
                totals.bricks += 1;
            }
            totals.coins += block.coins;
        }
        totals
    }
}

// ── Loading ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum LevelError {
    EmptyName,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::EmptyName => write!(f, "No level specified to load."),
            LevelError::Io { path, source } => {
                write!(f, "failed to read level {:?}: {}", path, source)
            }
            LevelError::Parse { path, source } => {
                write!(f, "failed to parse level {:?}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for LevelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LevelError::EmptyName => None,
            LevelError::Io { source, .. } => Some(source),
            LevelError::Parse { source, .. } => Some(source),
        }
    }
}

pub fn level_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.ron"))
}

pub fn parse_level(path: &Path, contents: &str) -> Result<LevelDefinition, LevelError> {
    ron::from_str(contents).map_err(|source| LevelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_level_file(dir: &Path, name: &str) -> Result<LevelDefinition, LevelError> {
    if name.is_empty() {
        return Err(LevelError::EmptyName);
    }
    let path = level_path(dir, name);
    let contents = std::fs::read_to_string(&path).map_err(|source| LevelError::Io {
        path: path.clone(),
        source,
    })?;
    parse_level(&path, &contents)
}

// ── Spawning ────────────────────────────────────────────────────────────────

#[derive(Resource)]
pub struct LevelAssets {
    pub cube: Handle<Mesh>,
    pub capsule: Handle<Mesh>,
    pub coin: Handle<Mesh>,
    pub flag: Handle<Mesh>,
    pub platform: Handle<StandardMaterial>,
    pub brick: Handle<StandardMaterial>,
    pub golden: Handle<StandardMaterial>,
    pub gold_coin: Handle<StandardMaterial>,
    pub red_coin: Handle<StandardMaterial>,
    pub player: Handle<StandardMaterial>,
    pub enemy: Handle<StandardMaterial>,
    pub goal: Handle<StandardMaterial>,
}

pub fn setup_level_assets(
    mut commands: Commands,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let (Some(mut meshes), Some(mut materials)) = (meshes, materials) else {
        return;
    };
    let mut color = |r: f32, g: f32, b: f32| materials.add(Color::srgb(r, g, b));
    commands.insert_resource(LevelAssets {
        cube: meshes.add(Cuboid::new(1.0, 1.0, 1.0)),
        capsule: meshes.add(Capsule3d::new(0.4, 0.8)),
        coin: meshes.add(Cylinder::new(0.35, 0.08)),
        flag: meshes.add(Cuboid::new(0.8, 0.5, 0.05)),
        platform: color(0.35, 0.6, 0.3),
        brick: color(0.65, 0.3, 0.15),
        golden: color(1.0, 0.8, 0.1),
        gold_coin: color(1.0, 0.85, 0.2),
        red_coin: color(0.9, 0.1, 0.1),
        player: color(0.2, 0.4, 0.9),
        enemy: color(0.5, 0.2, 0.6),
        goal: color(0.9, 0.9, 0.9),
    });
}

fn load_start_level(mut commands: Commands, config: Option<Res<GameConfig>>) {
    let name = config
        .map(|config| config.start_level.clone())
        .unwrap_or_else(|| GameConfig::default().start_level);
    commands.trigger(LoadLevel { name });
}

pub fn on_load_level(
    trigger: On<LoadLevel>,
    mut commands: Commands,
    config: Option<Res<GameConfig>>,
    assets: Option<Res<LevelAssets>>,
    mut session: ResMut<GameSession>,
    existing: Query<Entity, With<LevelEntity>>,
    // Broken blocks are disabled and only show up when asked for by name.
    disabled: Query<Entity, (With<LevelEntity>, With<Disabled>)>,
    mut cameras: Query<(Entity, &mut CameraRig)>,
) {
    let dir = config
        .map(|config| config.level_dir.clone())
        .unwrap_or_else(|| GameConfig::default().level_dir);

    let definition = match load_level_file(&dir, &trigger.name) {
        Ok(definition) => definition,
        Err(LevelError::EmptyName) => {
            warn!("No level specified to load.");
            return;
        }
        Err(e) => {
            // Keep whatever is loaded now rather than leaving an empty world.
            error!("{}", e);
            return;
        }
    };

    for entity in existing.iter().chain(disabled.iter()) {
        commands.entity(entity).try_despawn();
    }
    // A countdown started on the old level (goal reached, then game over
    // before it ran out) must not carry over.
    commands.remove_resource::<LevelTransition>();

    spawn_level(&mut commands, &definition, assets.as_deref());

    for (entity, mut rig) in cameras.iter_mut() {
        let camera = &definition.camera;
        rig.set_rotation(Vec3::from(camera.rotation));
        rig.distance = camera.distance;
        rig.height = camera.height;
        rig.offset = Vec3::from(camera.offset);
        rig.do_follow = true;
        commands
            .entity(entity)
            .try_remove::<(RotateTransition, OffsetTransition)>();
    }

    session.start_level(&trigger.name, definition.time_limit, definition.totals());
    info!(
        "Loaded level {} ({} blocks, {} enemies, {} coins)",
        trigger.name,
        definition.blocks.len(),
        definition.enemies.len(),
        definition.coins.len()
    );
    commands.trigger(LevelLoaded {
        name: trigger.name.clone(),
    });
}

/// Adds mesh and material when assets exist; headless worlds get the bare
/// gameplay entity.
fn dress(
    entity: &mut EntityCommands,
    mesh: Option<Handle<Mesh>>,
    material: Option<Handle<StandardMaterial>>,
) {
    if let (Some(mesh), Some(material)) = (mesh, material) {
        entity.insert((Mesh3d(mesh), MeshMaterial3d(material)));
    }
}

pub fn spawn_level(
    commands: &mut Commands,
    definition: &LevelDefinition,
    assets: Option<&LevelAssets>,
) {
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        LevelEntity,
    ));

    for platform in &definition.platforms {
        let size = Vec3::from(platform.size);
        let mut entity = commands.spawn((
            Name::new("Platform"),
            Transform::from_translation(Vec3::from(platform.position)).with_scale(size),
            Visibility::default(),
            // Rapier scales the collider with the transform.
            cuboid(Vec3::ONE),
            LevelEntity,
        ));
        dress(
            &mut entity,
            assets.map(|a| a.cube.clone()),
            assets.map(|a| a.platform.clone()),
        );
    }

    for block in &definition.blocks {
        let mut breakable = Breakable::new(block.health);
        breakable.destroy = block.destroy;
        breakable.adds_life = block.adds_life;
        breakable.coins_on_break = block.coins;
        breakable.hit_effect = block.hit_effect;
        breakable.break_effect = block.break_effect;

        let mut entity = commands.spawn((
            Name::new("Block"),
            breakable,
            Transform::from_translation(Vec3::from(block.position)),
            Visibility::default(),
            cuboid(Vec3::ONE),
            LevelEntity,
        ));
        let material = if block.adds_life {
            assets.map(|a| a.golden.clone())
        } else {
            assets.map(|a| a.brick.clone())
        };
        dress(&mut entity, assets.map(|a| a.cube.clone()), material);
    }

    for coin in &definition.coins {
        let mut entity = commands.spawn((
            Name::new(if coin.red { "Red coin" } else { "Coin" }),
            Coin {
                red: coin.red,
                value: coin.value,
            },
            Spin::default(),
            Transform::from_translation(Vec3::from(coin.position))
                .with_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
            Visibility::default(),
            cuboid(Vec3::splat(0.7)),
            LevelEntity,
        ));
        let material = if coin.red {
            assets.map(|a| a.red_coin.clone())
        } else {
            assets.map(|a| a.gold_coin.clone())
        };
        dress(&mut entity, assets.map(|a| a.coin.clone()), material);
    }

    for enemy in &definition.enemies {
        spawn_enemy(commands, enemy, assets);
    }

    for zone in &definition.camera_zones {
        commands.spawn((
            Name::new("Camera zone"),
            CameraZone {
                rotation: zone.rotation.map(Vec3::from),
                offset: zone.offset.map(Vec3::from),
            },
            Sensor,
            Transform::from_translation(Vec3::from(zone.position)),
            cuboid(Vec3::from(zone.size)),
            LevelEntity,
        ));
    }

    if let Some(goal) = &definition.goal {
        let mut entity = commands.spawn((
            Name::new("Goal"),
            EndGamePoint::new(goal.next_level.clone()),
            Transform::from_translation(Vec3::from(goal.position)),
            Visibility::default(),
            cuboid(Vec3::new(1.0, 3.0, 1.0)),
            LevelEntity,
        ));
        entity.with_children(|parent| {
            let mut pole = parent.spawn((
                Transform::from_scale(Vec3::new(0.1, 3.0, 0.1)),
                Visibility::default(),
            ));
            dress(
                &mut pole,
                assets.map(|a| a.cube.clone()),
                assets.map(|a| a.goal.clone()),
            );

            let mut flag = parent.spawn((
                GoalFlag::default(),
                Transform::from_xyz(0.45, GoalFlag::LOWERED, 0.0),
                Visibility::default(),
            ));
            dress(
                &mut flag,
                assets.map(|a| a.flag.clone()),
                assets.map(|a| a.red_coin.clone()),
            );
        });
    }

    let spawn = Vec3::from(definition.player_spawn);
    let mut player = commands.spawn((
        Name::new("Player"),
        Player,
        PlayerController::new(spawn, definition.fall_limit),
        Transform::from_translation(spawn),
        Visibility::default(),
        cuboid(Vec3::new(0.8, 1.6, 0.8)),
        LockedAxes::ROTATION_LOCKED,
        // Input sets the velocity every frame; friction would only make the
        // player stick to walls.
        Friction {
            coefficient: 0.0,
            combine_rule: CoefficientCombineRule::Min,
        },
        ActiveEvents::COLLISION_EVENTS,
        GroundProbe { reach: 0.9 },
        LevelEntity,
    ));
    dress(
        &mut player,
        assets.map(|a| a.capsule.clone()),
        assets.map(|a| a.player.clone()),
    );
}

fn spawn_enemy(commands: &mut Commands, enemy: &EnemyDef, assets: Option<&LevelAssets>) {
    let mut controller = EnemyController::new(enemy.kind)
        .with_route(enemy.waypoints.iter().copied().map(Vec3::from).collect());
    controller.damage = enemy.damage;
    if let Some(speed) = enemy.speed {
        controller.speed = speed;
    }
    if let Some(radius) = enemy.detection_radius {
        controller.detection_radius = radius;
    }
    if let Some(interval) = enemy.shoot_interval {
        controller.shoot_interval = interval;
    }

    commands
        .spawn((
            Name::new(format!("Enemy ({:?})", enemy.kind)),
            controller,
            Health(enemy.health),
            RigidBody::Dynamic,
            cuboid(Vec3::new(0.9, 1.0, 0.9)),
            ColliderMassProperties::Mass(1.0),
            Damping {
                linear_damping: 1.5,
                angular_damping: 0.0,
            },
            LockedAxes::ROTATION_LOCKED,
            ActiveEvents::COLLISION_EVENTS,
            MoveSound::default(),
            Transform::from_translation(Vec3::from(enemy.position)),
            Visibility::default(),
            LevelEntity,
        ))
        .with_children(|parent| {
            let mut body = parent.spawn((AnimatedBody, Transform::default(), Visibility::default()));
            dress(
                &mut body,
                assets.map(|a| a.capsule.clone()),
                assets.map(|a| a.enemy.clone()),
            );
        });
}

/// Counts the level clock down; running out costs a life.
pub fn session_clock_system(
    mut commands: Commands,
    time: Res<Time>,
    mut session: ResMut<GameSession>,
) {
    if session.tick_timer(time.delta_secs()) {
        warn!("Time ran out on {}", session.level);
        commands.trigger(PlayerHurt {
            cause: HurtCause::TimeUp,
        });
    }
}
