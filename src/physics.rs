// physics.rs - Rapier glue.
//
// Rapier owns bodies, contacts and ray casts. This module turns its collision
// messages into the two observer events gameplay code listens to, and keeps a
// grounded flag for bodies that need one.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::rapier::geometry::CollisionEventFlags;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        // Stepping in the fixed schedule keeps the simulation in lockstep with
        // enemy behaviour, which also runs on the fixed clock.
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
            .add_systems(
                FixedPostUpdate,
                (collision_events_system, ground_probe_system).after(PhysicsSet::Writeback),
            );
    }
}

/// Box collider from full extents (rapier takes half extents).
pub fn cuboid(size: Vec3) -> Collider {
    Collider::cuboid(size.x * 0.5, size.y * 0.5, size.z * 0.5)
}

/// Fired once when two solids start touching, for each side that has a rigid
/// body. `normal` points away from `other`.
#[derive(Event, Debug, Clone, Copy)]
pub struct Collided {
    pub entity: Entity,
    pub other: Entity,
    pub normal: Vec3,
}

/// Fired once when something enters a sensor.
#[derive(Event, Debug, Clone, Copy)]
pub struct TriggerEntered {
    pub sensor: Entity,
    pub other: Entity,
}

/// Whether something solid is right under the body.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Grounded(pub bool);

/// Casts down from the body's centre each physics step to update [`Grounded`].
#[derive(Component, Debug, Clone, Copy)]
#[require(Grounded)]
pub struct GroundProbe {
    /// Ray length: half the body height plus a little slack.
    pub reach: f32,
}

/// Waypoint snapping and similar probes never look further than this.
pub const MAX_GROUND_DISTANCE: f32 = 500.0;

/// Rapier's manifold normal points from the first collider toward the second.
pub fn away_from_other(manifold_normal: Vec3, entity_is_first: bool) -> Vec3 {
    if entity_is_first {
        -manifold_normal
    } else {
        manifold_normal
    }
}

/// Used when rapier no longer has a manifold for the pair.
pub fn separation_normal(position: Vec3, other_position: Vec3) -> Vec3 {
    (position - other_position).try_normalize().unwrap_or(Vec3::Y)
}

fn contact_normal(context: &RapierContext, entity: Entity, other: Entity) -> Option<Vec3> {
    let pair = context.contact_pair(entity, other)?;
    let manifold = pair.manifolds().next()?;
    Some(away_from_other(manifold.normal(), pair.collider1() == Some(entity)))
}

/// Height of the first fixed, non-sensor surface straight below `point`.
pub fn ground_below(context: &RapierContext, point: Vec3) -> Option<f32> {
    let filter = QueryFilter::only_fixed().exclude_sensors();
    context
        .cast_ray(point, Vec3::NEG_Y, MAX_GROUND_DISTANCE, true, filter)
        .map(|(_, distance)| point.y - distance)
}

pub fn collision_events_system(
    mut commands: Commands,
    mut events: MessageReader<CollisionEvent>,
    rapier: ReadRapierContext,
    sensors: Query<(), With<Sensor>>,
    bodies: Query<(), With<RigidBody>>,
    transforms: Query<&GlobalTransform>,
) {
    let context = rapier.single().ok();

    for event in events.read() {
        let (a, b, flags) = match event {
            CollisionEvent::Started(a, b, flags) => (*a, *b, *flags),
            CollisionEvent::Stopped(..) => continue,
        };

        if flags.contains(CollisionEventFlags::SENSOR) {
            for (sensor, other) in [(a, b), (b, a)] {
                if sensors.contains(sensor) {
                    commands.trigger(TriggerEntered { sensor, other });
                }
            }
            continue;
        }

        for (entity, other) in [(a, b), (b, a)] {
            if !bodies.contains(entity) {
                continue;
            }
            let normal = context
                .as_ref()
                .and_then(|context| contact_normal(context, entity, other))
                .or_else(|| {
                    let (Ok(here), Ok(there)) = (transforms.get(entity), transforms.get(other))
                    else {
                        return None;
                    };
                    Some(separation_normal(here.translation(), there.translation()))
                })
                .unwrap_or(Vec3::Y);
            commands.trigger(Collided {
                entity,
                other,
                normal,
            });
        }
    }
}

pub fn ground_probe_system(
    rapier: ReadRapierContext,
    mut bodies: Query<(Entity, &GlobalTransform, &GroundProbe, &mut Grounded)>,
) {
    let Ok(context) = rapier.single() else {
        return;
    };
    for (entity, transform, probe, mut grounded) in bodies.iter_mut() {
        let filter = QueryFilter::default()
            .exclude_collider(entity)
            .exclude_sensors();
        let hit = context.cast_ray(
            transform.translation(),
            Vec3::NEG_Y,
            probe.reach,
            true,
            filter,
        );
        grounded.set_if_neq(Grounded(hit.is_some()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_points_away_from_the_other_collider() {
        // Player (first) resting on an enemy (second): rapier reports the
        // normal from player toward enemy, i.e. down.
        assert_eq!(away_from_other(Vec3::NEG_Y, true), Vec3::Y);
        assert_eq!(away_from_other(Vec3::NEG_Y, false), Vec3::NEG_Y);
    }

    #[test]
    fn separation_falls_back_to_up_for_coincident_bodies() {
        assert_eq!(separation_normal(Vec3::ONE, Vec3::ONE), Vec3::Y);
        assert_eq!(
            separation_normal(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO),
            Vec3::Z
        );
    }
}
