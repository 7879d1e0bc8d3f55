use bevy::prelude::*;

pub struct HealthPlugin;

impl Plugin for HealthPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, despawn_timer_system);
    }
}

#[derive(Component, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Health(pub i32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    Hurt,
    Killed,
}

impl Health {
    pub fn take(&mut self, amount: i32) -> DamageOutcome {
        self.0 -= amount;
        if self.0 <= 0 {
            DamageOutcome::Killed
        } else {
            DamageOutcome::Hurt
        }
    }
}

/// Marker: the entity is playing out its death and ignores further damage.
#[derive(Component, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dying;

/// Despawns the entity (and its children) when the timer runs out.
#[derive(Component)]
pub struct DespawnTimer(pub Timer);

impl DespawnTimer {
    pub fn from_seconds(seconds: f32) -> Self {
        Self(Timer::from_seconds(seconds, TimerMode::Once))
    }
}

pub fn despawn_timer_system(
    mut commands: Commands,
    mut query: Query<(Entity, &mut DespawnTimer)>,
    time: Res<Time>,
) {
    for (entity, mut timer) in query.iter_mut() {
        timer.0.tick(time.delta());
        if timer.0.is_finished() {
            commands.entity(entity).try_despawn();
        }
    }
}
