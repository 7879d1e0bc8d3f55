use bevy::{ecs::entity_disabling::Disabled, prelude::*};
use bevy_rapier3d::prelude::Collider;

use crate::{
    audio::{PlaySound, SoundKind},
    effects::{EffectKind, SpawnEffect},
    resources::GameSession,
};

pub struct BreakablePlugin;

impl Plugin for BreakablePlugin {
    fn build(&self, app: &mut App) {
        app.add_observer(on_hit_block);
    }
}

/// A block with a hit counter. Broken blocks are either despawned or
/// disabled, depending on `destroy`.
#[derive(Component, Debug, Clone)]
pub struct Breakable {
    pub health: i32,
    current_health: i32,
    pub destroy: bool,
    /// Golden blocks give a life instead of counting as a brick.
    pub adds_life: bool,
    pub coins_on_break: u32,
    pub hit_effect: Option<EffectKind>,
    pub break_effect: Option<EffectKind>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HitOutcome {
    Damaged,
    Broken,
}

impl Breakable {
    pub fn new(health: i32) -> Self {
        Self {
            health,
            current_health: health,
            destroy: false,
            adds_life: false,
            coins_on_break: 0,
            hit_effect: None,
            break_effect: None,
        }
    }

    pub fn current_health(&self) -> i32 {
        self.current_health
    }

    pub fn hit(&mut self) -> HitOutcome {
        self.current_health -= 1;
        if self.current_health <= 0 {
            HitOutcome::Broken
        } else {
            HitOutcome::Damaged
        }
    }
}

/// Ask a block to take one hit.
#[derive(Event, Debug, Clone, Copy)]
pub struct HitBlock {
    pub block: Entity,
}

/// Raised after every hit, broken or not.
#[derive(Event, Debug, Clone, Copy)]
pub struct BlockHit {
    pub block: Entity,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct BlockBroken {
    pub block: Entity,
    pub adds_life: bool,
}

pub fn on_hit_block(
    trigger: On<HitBlock>,
    mut commands: Commands,
    mut blocks: Query<(&Transform, &mut Breakable)>,
    mut session: ResMut<GameSession>,
) {
    // Disabled (already broken) blocks are invisible to this query.
    let Ok((transform, mut breakable)) = blocks.get_mut(trigger.block) else {
        return;
    };
    let position = transform.translation;

    if let Some(kind) = breakable.hit_effect {
        commands.trigger(SpawnEffect { kind, position });
    }
    let outcome = breakable.hit();
    commands.trigger(BlockHit {
        block: trigger.block,
    });

    if outcome == HitOutcome::Damaged {
        commands.trigger(PlaySound(SoundKind::BlockHit));
        return;
    }

    if let Some(kind) = breakable.break_effect {
        commands.trigger(SpawnEffect { kind, position });
    }

    if breakable.destroy {
        commands.entity(trigger.block).try_despawn();
    } else {
        // The collider goes first so rapier sees the removal; disabled
        // entities are invisible to its sync systems.
        commands
            .entity(trigger.block)
            .remove::<Collider>()
            .insert(Disabled);
    }

    if breakable.adds_life {
        session.add_life(1);
        session.add_golden_block();
        commands.trigger(PlaySound(SoundKind::ExtraLife));
    } else {
        session.add_block();
        commands.trigger(PlaySound(SoundKind::BlockBreak));
    }
    if breakable.coins_on_break > 0 {
        session.add_coin(breakable.coins_on_break);
    }

    commands.trigger(BlockBroken {
        block: trigger.block,
        adds_life: breakable.adds_life,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaks_on_last_hit_point() {
        let mut block = Breakable::new(2);
        assert_eq!(block.hit(), HitOutcome::Damaged);
        assert_eq!(block.current_health(), 1);
        assert_eq!(block.hit(), HitOutcome::Broken);
    }

    #[test]
    fn zero_health_block_breaks_on_first_hit() {
        let mut block = Breakable::new(0);
        assert_eq!(block.hit(), HitOutcome::Broken);
    }
}
