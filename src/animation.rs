use bevy::prelude::*;

use crate::GameSet;

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (animator_system, pose_system)
                .chain()
                .in_set(GameSet::Presentation),
        );
    }
}

/// Locomotion blend the animator is in. Idle = not moving, Walk = patrol
/// speed, Run = tackle/charge speed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gait {
    #[default]
    Idle,
    Walk,
    Run,
}

/// Parameter block the behaviour code writes to and the pose system reads.
///
/// One-shot clips (attack, hit reaction) are modelled as timers: while the
/// timer runs the clip is "playing", which is what the attacker checks before
/// it is allowed to act again.
#[derive(Component, Debug, Default)]
pub struct Animator {
    pub gait: Gait,
    pub dead: bool,
    hit_reaction: Option<Timer>,
    attack: Option<Timer>,
    cycle: f32,
}

impl Animator {
    pub const HIT_REACTION_SECS: f32 = 0.4;
    pub const ATTACK_SECS: f32 = 0.5;

    pub fn set_gait(&mut self, gait: Gait) {
        self.gait = gait;
    }

    /// The "Shoot" trigger. Restarts the clip if it is already playing.
    pub fn play_attack(&mut self) {
        self.attack = Some(Timer::from_seconds(Self::ATTACK_SECS, TimerMode::Once));
    }

    pub fn play_hit_reaction(&mut self) {
        self.hit_reaction = Some(Timer::from_seconds(
            Self::HIT_REACTION_SECS,
            TimerMode::Once,
        ));
    }

    pub fn in_hit_reaction(&self) -> bool {
        self.hit_reaction.is_some()
    }

    pub fn is_attacking(&self) -> bool {
        self.attack.is_some()
    }

    pub fn update(&mut self, delta_time: f32) {
        let delta = std::time::Duration::from_secs_f32(delta_time.max(0.0));
        for clip in [&mut self.hit_reaction, &mut self.attack] {
            let finished = clip.as_mut().is_some_and(|timer| timer.tick(delta).is_finished());
            if finished {
                *clip = None;
            }
        }

        let rate = match self.gait {
            Gait::Idle => 2.0,
            Gait::Walk => 8.0,
            Gait::Run => 14.0,
        };
        self.cycle = (self.cycle + delta_time * rate) % std::f32::consts::TAU;
    }

    /// Local transform for the visible body relative to its root.
    pub fn pose(&self) -> Transform {
        if self.dead {
            return Transform::from_xyz(0.0, -0.35, 0.0).with_scale(Vec3::new(1.3, 0.3, 1.3));
        }

        let mut pose = Transform::IDENTITY;
        let bob = match self.gait {
            Gait::Idle => 0.02,
            Gait::Walk => 0.06,
            Gait::Run => 0.1,
        };
        pose.translation.y = self.cycle.sin().abs() * bob;

        if self.in_hit_reaction() {
            pose.scale = Vec3::new(1.15, 0.85, 1.15);
        }
        if self.is_attacking() {
            pose.rotation = Quat::from_rotation_x(-0.35);
        }
        pose
    }
}

/// Marker for the mesh child that the pose is applied to.
#[derive(Component)]
pub struct AnimatedBody;

pub fn animator_system(mut animators: Query<&mut Animator>, time: Res<Time>) {
    for mut animator in animators.iter_mut() {
        animator.update(time.delta_secs());
    }
}

pub fn pose_system(
    animators: Query<&Animator>,
    mut bodies: Query<(&ChildOf, &mut Transform), With<AnimatedBody>>,
) {
    for (child_of, mut transform) in bodies.iter_mut() {
        if let Ok(animator) = animators.get(child_of.parent()) {
            *transform = animator.pose();
        }
    }
}
