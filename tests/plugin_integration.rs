//! Plugin-level integration tests
//!
//! These build a headless `App` with `MinimalPlugins` and step it with a fixed
//! manual clock, so rapier and the startup schedule run exactly as in the game
//! but without a window.
//!
//! ```sh
//! cargo test --test plugin_integration
//! ```

use std::time::Duration;

use bevy::{prelude::*, time::TimeUpdateStrategy};
use bevy_rapier3d::prelude::*;

use student_quest::{
    camera::{CameraPlugin, CameraRig},
    config::GameConfig,
    enemy::{snap_waypoints_system, EnemyController, EnemyKind},
    level::LevelPlugin,
    physics::{cuboid, Collided, GroundProbe, Grounded, PhysicsPlugin, TriggerEntered},
    resources::GameSession,
};

// =============================================================================
// Helpers
// =============================================================================

#[derive(Resource, Default)]
struct Contacts(Vec<Collided>);

#[derive(Resource, Default)]
struct Entered(Vec<TriggerEntered>);

fn physics_app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, TransformPlugin, PhysicsPlugin))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / 64.0,
        )))
        .init_resource::<Contacts>()
        .init_resource::<Entered>()
        .add_observer(|trigger: On<Collided>, mut contacts: ResMut<Contacts>| {
            contacts.0.push(*trigger.event());
        })
        .add_observer(|trigger: On<TriggerEntered>, mut entered: ResMut<Entered>| {
            entered.0.push(*trigger.event());
        });
    app
}

/// 10x1x10 floor whose top face sits at y = 0.
fn spawn_floor(app: &mut App) -> Entity {
    app.world_mut()
        .spawn((
            RigidBody::Fixed,
            cuboid(Vec3::new(10.0, 1.0, 10.0)),
            Transform::from_xyz(0.0, -0.5, 0.0),
        ))
        .id()
}

fn spawn_crate(app: &mut App, height: f32) -> Entity {
    app.world_mut()
        .spawn((
            RigidBody::Dynamic,
            cuboid(Vec3::ONE),
            LockedAxes::ROTATION_LOCKED,
            ActiveEvents::COLLISION_EVENTS,
            GroundProbe { reach: 0.6 },
            Transform::from_xyz(0.0, height, 0.0),
        ))
        .id()
}

fn step(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

// =============================================================================
// Physics
// =============================================================================

#[test]
fn falling_body_lands_and_reports_the_floor_contact() {
    let mut app = physics_app();
    let floor = spawn_floor(&mut app);
    let body = spawn_crate(&mut app, 2.0);

    step(&mut app, 10);
    assert_eq!(app.world().get::<Grounded>(body), Some(&Grounded(false)));

    step(&mut app, 110);

    let contacts = &app.world().resource::<Contacts>().0;
    let landing = contacts
        .iter()
        .find(|contact| contact.entity == body && contact.other == floor)
        .expect("crate should report touching the floor");
    // Away from the floor, i.e. up.
    assert!(landing.normal.y > 0.5, "normal was {}", landing.normal);
    // The fixed floor is a body too and hears about it with the opposite normal.
    let floor_side = contacts
        .iter()
        .find(|contact| contact.entity == floor && contact.other == body)
        .expect("floor should report the crate");
    assert!(floor_side.normal.y < -0.5, "normal was {}", floor_side.normal);

    assert_eq!(app.world().get::<Grounded>(body), Some(&Grounded(true)));
    let resting = app.world().get::<Transform>(body).unwrap().translation.y;
    assert!((resting - 0.5).abs() < 0.1, "crate rests at {resting}");
}

#[test]
fn sensor_reports_each_body_once() {
    let mut app = physics_app();
    spawn_floor(&mut app);
    let zone = app
        .world_mut()
        .spawn((
            cuboid(Vec3::new(4.0, 1.0, 4.0)),
            Sensor,
            Transform::from_xyz(0.0, 1.0, 0.0),
        ))
        .id();
    let body = spawn_crate(&mut app, 3.0);

    step(&mut app, 120);

    let entered = &app.world().resource::<Entered>().0;
    assert_eq!(entered.len(), 1);
    assert_eq!(entered[0].sensor, zone);
    assert_eq!(entered[0].other, body);
    // Sensors never produce solid contacts.
    assert!(app
        .world()
        .resource::<Contacts>()
        .0
        .iter()
        .all(|contact| contact.other != zone));
}

#[test]
fn patrol_waypoints_snap_onto_the_floor() {
    let mut app = physics_app();
    app.add_systems(
        FixedPostUpdate,
        snap_waypoints_system.after(PhysicsSet::Writeback),
    );
    spawn_floor(&mut app);
    let enemy = app
        .world_mut()
        .spawn((
            EnemyController::new(EnemyKind::Patrol).with_route(vec![
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(3.0, 2.0, 0.0),
                // Nothing below this one.
                Vec3::new(50.0, 5.0, 0.0),
            ]),
            Transform::default(),
        ))
        .id();

    step(&mut app, 5);

    let points = &app.world().get::<EnemyController>(enemy).unwrap().route.points;
    assert!(points[0].abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-3), "{}", points[0]);
    assert!(points[1].abs_diff_eq(Vec3::new(3.0, 0.5, 0.0), 1e-3), "{}", points[1]);
    assert_eq!(points[2], Vec3::new(50.0, 5.0, 0.0));
}

// =============================================================================
// Startup
// =============================================================================

#[test]
fn first_level_configures_the_camera_rig_at_startup() {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, CameraPlugin, LevelPlugin))
        .insert_resource(GameConfig {
            level_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/assets/levels").into(),
            ..GameConfig::default()
        })
        .insert_resource(GameSession::default());

    app.update();

    assert_eq!(app.world().resource::<GameSession>().level, "level1");
    let mut rigs = app.world_mut().query::<&CameraRig>();
    let rig = rigs.single(app.world()).expect("exactly one camera rig");
    assert_eq!(rig.distance, 14.0);
    assert_eq!(rig.offset, Vec3::new(0.0, 1.0, 0.0));
}
