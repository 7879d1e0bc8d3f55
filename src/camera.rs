use bevy::{
    input::mouse::AccumulatedMouseMotion,
    prelude::*,
    window::{CursorGrabMode, CursorOptions, PrimaryWindow},
};

use crate::{
    config::GameConfig,
    physics::TriggerEntered,
    player::Player,
    GameSet,
};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (spawn_camera, lock_cursor_on_start))
            .add_systems(
                Update,
                (camera_transition_system, camera_follow_system)
                    .chain()
                    .in_set(GameSet::Presentation),
            )
            .add_observer(on_power_up_camera)
            .add_observer(on_camera_zone_entered);
    }
}

/// Third-person follow camera. `rotation` is (pitch, yaw, roll) in degrees;
/// positive pitch looks down and positive yaw turns right.
#[derive(Component, Debug, Clone)]
pub struct CameraRig {
    pub rotation: Vec3,
    pub distance: f32,
    pub height: f32,
    pub offset: Vec3,
    pub speed_transition: f32,
    pub do_follow: bool,
    pub mouse_sensitivity: f32,
    /// Accumulated mouse look as (yaw, pitch).
    look: Vec2,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(Vec3::new(20.0, 0.0, 0.0))
    }
}

impl CameraRig {
    pub const PITCH_LIMIT: f32 = 45.0;
    /// Transitions snap to the target once this close.
    pub const SNAP_DISTANCE: f32 = 0.1;

    pub fn new(rotation: Vec3) -> Self {
        Self {
            rotation,
            distance: 20.0,
            height: 1.0,
            offset: Vec3::ZERO,
            speed_transition: 2.0,
            do_follow: true,
            mouse_sensitivity: 6.0,
            look: Vec2::new(rotation.y, rotation.x),
        }
    }

    /// Jump straight to a rotation and make mouse look continue from it.
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.look = Vec2::new(rotation.y, rotation.x);
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            -self.rotation.y.to_radians(),
            -self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    /// Horizontal forward, used for camera-relative movement.
    pub fn flat_forward(&self) -> Vec3 {
        Quat::from_rotation_y(-self.rotation.y.to_radians()) * Vec3::NEG_Z
    }

    pub fn flat_right(&self) -> Vec3 {
        Quat::from_rotation_y(-self.rotation.y.to_radians()) * Vec3::X
    }

    pub fn apply_mouse(&mut self, delta: Vec2, dt: f32) {
        self.look.x += delta.x * self.mouse_sensitivity * dt;
        self.look.y += delta.y * self.mouse_sensitivity * dt;
        self.look.y = self.look.y.clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.rotation = Vec3::new(self.look.y, self.look.x, 0.0);
    }

    /// Camera transform looking at `target + offset` from behind and above.
    pub fn place(&self, target: Vec3) -> Transform {
        let rotation = self.orientation();
        let focus = target + self.offset;
        let forward = rotation * Vec3::NEG_Z;
        Transform {
            translation: focus - forward * self.distance + Vec3::Y * self.height,
            rotation,
            ..default()
        }
    }
}

/// One frame of a transition: lerp toward `target`, or snap and report done
/// once within [`CameraRig::SNAP_DISTANCE`].
pub fn approach(current: Vec3, target: Vec3, factor: f32) -> (Vec3, bool) {
    if current.distance(target) > CameraRig::SNAP_DISTANCE {
        (current.lerp(target, factor.clamp(0.0, 1.0)), false)
    } else {
        (target, true)
    }
}

/// Running rotation transition. Inserting a new one replaces the old.
#[derive(Component, Debug, Clone, Copy)]
pub struct RotateTransition {
    pub target: Vec3,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct OffsetTransition {
    pub target: Vec3,
}

pub fn rotate(commands: &mut Commands, camera: Entity, target: Vec3) {
    commands.entity(camera).insert(RotateTransition { target });
}

pub fn offset(commands: &mut Commands, camera: Entity, target: Vec3) {
    commands.entity(camera).insert(OffsetTransition { target });
}

/// End-of-level view: raise the focus and swing round to face the player.
#[derive(Event, Debug, Clone, Copy)]
pub struct PowerUpCamera;

/// Sensor volume that re-frames the camera when the player walks in.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CameraZone {
    pub rotation: Option<Vec3>,
    pub offset: Option<Vec3>,
}

pub fn spawn_camera(mut commands: Commands, config: Option<Res<GameConfig>>) {
    let mut rig = CameraRig::default();
    if let Some(config) = config {
        rig.mouse_sensitivity = config.mouse_sensitivity;
    }
    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        rig,
        Transform::default(),
    ));
}

pub fn set_cursor_locked(options: &mut CursorOptions, locked: bool) {
    options.visible = !locked;
    options.grab_mode = if locked {
        CursorGrabMode::Locked
    } else {
        CursorGrabMode::None
    };
}

fn lock_cursor_on_start(mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>) {
    if let Ok(mut options) = cursors.single_mut() {
        set_cursor_locked(&mut options, true);
    }
}

pub fn camera_transition_system(
    mut commands: Commands,
    time: Res<Time>,
    mut cameras: Query<(
        Entity,
        &mut CameraRig,
        Option<&RotateTransition>,
        Option<&OffsetTransition>,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut rig, rotate, offset) in cameras.iter_mut() {
        let factor = dt * rig.speed_transition;

        if let Some(transition) = rotate {
            let (rotation, done) = approach(rig.rotation, transition.target, factor);
            if done {
                rig.set_rotation(rotation);
                commands.entity(entity).try_remove::<RotateTransition>();
            } else {
                rig.rotation = rotation;
            }
        }

        if let Some(transition) = offset {
            let (value, done) = approach(rig.offset, transition.target, factor);
            rig.offset = value;
            if done {
                commands.entity(entity).try_remove::<OffsetTransition>();
            }
        }
    }
}

pub fn camera_follow_system(
    time: Res<Time>,
    mouse: Option<Res<AccumulatedMouseMotion>>,
    players: Query<&Transform, (With<Player>, Without<CameraRig>)>,
    mut cameras: Query<(&mut CameraRig, &mut Transform, Has<RotateTransition>)>,
) {
    let Ok(player) = players.single() else {
        return;
    };
    let delta = mouse.map(|m| m.delta).unwrap_or(Vec2::ZERO);

    for (mut rig, mut transform, rotating) in cameras.iter_mut() {
        if !rig.do_follow {
            continue;
        }
        // Mouse look would fight a running rotation; it resumes from the
        // target once the transition snaps.
        if !rotating {
            rig.apply_mouse(delta, time.delta_secs());
        }
        *transform = rig.place(player.translation);
    }
}

pub fn on_power_up_camera(
    _trigger: On<PowerUpCamera>,
    mut commands: Commands,
    cameras: Query<(Entity, &CameraRig)>,
) {
    for (entity, rig) in cameras.iter() {
        offset(&mut commands, entity, Vec3::new(0.0, 1.5, 0.0));
        rotate(
            &mut commands,
            entity,
            Vec3::new(10.0, rig.rotation.y + 180.0, 0.0),
        );
    }
}

pub fn on_camera_zone_entered(
    trigger: On<TriggerEntered>,
    mut commands: Commands,
    zones: Query<&CameraZone>,
    players: Query<(), With<Player>>,
    cameras: Query<Entity, With<CameraRig>>,
) {
    let Ok(zone) = zones.get(trigger.sensor) else {
        return;
    };
    if players.get(trigger.other).is_err() {
        return;
    }
    for camera in cameras.iter() {
        if let Some(target) = zone.rotation {
            rotate(&mut commands, camera, target);
        }
        if let Some(target) = zone.offset {
            offset(&mut commands, camera, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approach_snaps_when_close() {
        let (value, done) = approach(Vec3::new(0.95, 0.0, 0.0), Vec3::X, 0.5);
        assert!(done);
        assert_eq!(value, Vec3::X);

        let (value, done) = approach(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 0.5);
        assert!(!done);
        assert!((value.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn place_sits_behind_and_above_focus() {
        let rig = CameraRig::new(Vec3::ZERO);
        let transform = rig.place(Vec3::ZERO);
        // Yaw 0 looks down -Z, so the camera sits on +Z.
        assert!((transform.translation - Vec3::new(0.0, 1.0, 20.0)).length() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut rig = CameraRig::new(Vec3::ZERO);
        rig.apply_mouse(Vec2::new(0.0, 1000.0), 1.0);
        assert_eq!(rig.rotation.x, CameraRig::PITCH_LIMIT);
    }

    #[test]
    fn positive_yaw_turns_right() {
        let rig = CameraRig::new(Vec3::new(0.0, 90.0, 0.0));
        assert!((rig.flat_forward() - Vec3::X).length() < 1e-5);
    }
}
