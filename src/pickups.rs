use bevy::prelude::*;
use bevy_rapier3d::prelude::Sensor;

use crate::{
    audio::{PlaySound, SoundKind},
    effects::{EffectKind, SpawnEffect},
    physics::TriggerEntered,
    player::Player,
    resources::GameSession,
};

pub struct PickupsPlugin;

impl Plugin for PickupsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, spin_system)
            .add_observer(on_coin_trigger);
    }
}

/// Collectible. Red coins fill the power-up capsule instead of the coin count.
#[derive(Component, Debug, Clone, Copy)]
#[require(Sensor)]
pub struct Coin {
    pub red: bool,
    pub value: u32,
}

/// Radians per second around the world Y axis.
#[derive(Component, Debug, Clone, Copy)]
pub struct Spin(pub f32);

impl Default for Spin {
    fn default() -> Self {
        Self(3.0)
    }
}

pub fn spin_system(time: Res<Time>, mut spinners: Query<(&Spin, &mut Transform)>) {
    for (spin, mut transform) in spinners.iter_mut() {
        transform.rotate_y(spin.0 * time.delta_secs());
    }
}

pub fn on_coin_trigger(
    trigger: On<TriggerEntered>,
    mut commands: Commands,
    coins: Query<(&Coin, &Transform)>,
    players: Query<(), With<Player>>,
    mut session: ResMut<GameSession>,
) {
    let Ok((coin, transform)) = coins.get(trigger.sensor) else {
        return;
    };
    if players.get(trigger.other).is_err() {
        return;
    }

    if coin.red {
        session.add_red_coin();
        commands.trigger(SpawnEffect {
            kind: EffectKind::Sparkle,
            position: transform.translation,
        });
    } else {
        session.add_coin(coin.value);
    }
    commands.trigger(PlaySound(SoundKind::Coin));
    commands.entity(trigger.sensor).try_despawn();
}
