use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{health::DespawnTimer, level::LevelEntity};

pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_effect_assets)
            .add_systems(Update, debris_system)
            .add_observer(on_spawn_effect);
    }
}

/// Short particle bursts. Which one a block or enemy uses is level data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Small bright chips, used when something is hit but survives.
    Spark,
    /// Brick chunks falling away.
    Rubble,
    /// Golden glitter for extra-life blocks and coins.
    Sparkle,
    /// Grey puff when an enemy is defeated.
    Smoke,
}

impl EffectKind {
    pub fn pieces(self) -> usize {
        match self {
            EffectKind::Spark => 5,
            EffectKind::Rubble => 8,
            EffectKind::Sparkle => 10,
            EffectKind::Smoke => 6,
        }
    }

    pub fn lifetime(self) -> f32 {
        match self {
            EffectKind::Spark => 0.4,
            EffectKind::Rubble => 1.2,
            EffectKind::Sparkle => 0.8,
            EffectKind::Smoke => 1.0,
        }
    }

    fn color(self) -> Color {
        match self {
            EffectKind::Spark => Color::srgb(1.0, 0.9, 0.5),
            EffectKind::Rubble => Color::srgb(0.6, 0.3, 0.15),
            EffectKind::Sparkle => Color::srgb(1.0, 0.8, 0.1),
            EffectKind::Smoke => Color::srgb(0.5, 0.5, 0.55),
        }
    }
}

#[derive(Event, Debug, Clone, Copy)]
pub struct SpawnEffect {
    pub kind: EffectKind,
    pub position: Vec3,
}

/// Root of one burst. Despawned with its debris when the lifetime ends.
#[derive(Component, Debug)]
pub struct EffectBurst;

#[derive(Component, Debug)]
pub struct Debris {
    pub velocity: Vec3,
}

#[derive(Resource)]
pub struct EffectAssets {
    pub chunk: Handle<Mesh>,
    pub spark: Handle<StandardMaterial>,
    pub rubble: Handle<StandardMaterial>,
    pub sparkle: Handle<StandardMaterial>,
    pub smoke: Handle<StandardMaterial>,
}

impl EffectAssets {
    fn material(&self, kind: EffectKind) -> Handle<StandardMaterial> {
        match kind {
            EffectKind::Spark => self.spark.clone(),
            EffectKind::Rubble => self.rubble.clone(),
            EffectKind::Sparkle => self.sparkle.clone(),
            EffectKind::Smoke => self.smoke.clone(),
        }
    }
}

pub fn setup_effect_assets(
    mut commands: Commands,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let (Some(mut meshes), Some(mut materials)) = (meshes, materials) else {
        return;
    };
    let mut material = |kind: EffectKind| {
        materials.add(StandardMaterial {
            base_color: kind.color(),
            unlit: true,
            ..default()
        })
    };
    commands.insert_resource(EffectAssets {
        chunk: meshes.add(Cuboid::new(0.15, 0.15, 0.15)),
        spark: material(EffectKind::Spark),
        rubble: material(EffectKind::Rubble),
        sparkle: material(EffectKind::Sparkle),
        smoke: material(EffectKind::Smoke),
    });
}

pub fn on_spawn_effect(
    trigger: On<SpawnEffect>,
    mut commands: Commands,
    assets: Option<Res<EffectAssets>>,
) {
    let kind = trigger.kind;
    let mut burst = commands.spawn((
        Name::new("Effect"),
        EffectBurst,
        Transform::from_translation(trigger.position),
        Visibility::default(),
        DespawnTimer::from_seconds(kind.lifetime()),
        LevelEntity,
    ));

    let Some(assets) = assets else {
        return;
    };
    let mut rng = rand::thread_rng();
    burst.with_children(|parent| {
        for _ in 0..kind.pieces() {
            let velocity = Vec3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(2.0..5.0),
                rng.gen_range(-2.0..2.0),
            );
            parent.spawn((
                Debris { velocity },
                Mesh3d(assets.chunk.clone()),
                MeshMaterial3d(assets.material(kind)),
                Transform::default(),
            ));
        }
    });
}

pub fn debris_system(mut debris: Query<(&mut Transform, &mut Debris)>, time: Res<Time>) {
    let dt = time.delta_secs();
    for (mut transform, mut piece) in debris.iter_mut() {
        piece.velocity.y -= 9.81 * dt;
        transform.translation += piece.velocity * dt;
        transform.scale *= (1.0 - dt * 1.5).max(0.0);
    }
}
