use avian3d::prelude::*;
use bevy::{ecs::query::QueryData, prelude::*};

use crate::{
    SMALL_THRESHOLD,
    body::{CharacterBody, MoveOutcome},
    mover::Mover,
};

/// How far below the capsule the ground check reaches.
const GROUND_TOLERANCE: f32 = 0.1;

/// Physics components for a capsule-shaped character driven by a
/// [Mover]. The body is dynamic so the solver resolves collisions, but
/// rotation is locked and engine gravity is off: the mover integrates
/// gravity and rotation itself. A downward shape cast reports whether
/// the capsule is standing on something.
pub fn character_capsule(radius: f32, length: f32) -> impl Bundle {
    (
        RigidBody::Dynamic,
        Collider::capsule(radius, length),
        LockedAxes::ROTATION_LOCKED,
        GravityScale(0.0),
        ShapeCaster::new(
            Collider::sphere(radius * 0.95),
            Vec3::ZERO,
            Quat::IDENTITY,
            Dir3::NEG_Y,
        )
        .with_max_distance(length * 0.5 + GROUND_TOLERANCE),
    )
}

/// [CharacterBody] on top of avian3d. The displacement is turned into
/// a velocity for the next physics step, which resolves collisions.
/// Grounding comes from the agent's [ShapeHits], if it has any.
pub(crate) struct VelocityBody<'a> {
    velocity: &'a mut LinearVelocity,
    grounded: bool,
    dt: f32,
}

impl<'a> VelocityBody<'a> {
    pub(crate) fn new(
        velocity: &'a mut LinearVelocity,
        hits: Option<&ShapeHits>,
        dt: f32,
    ) -> Self {
        Self {
            velocity,
            grounded: hits.is_some_and(|hits| !hits.is_empty()),
            dt,
        }
    }
}

impl CharacterBody for VelocityBody<'_> {
    fn try_move(&mut self, displacement: Vec3) -> MoveOutcome {
        if self.dt < SMALL_THRESHOLD {
            self.velocity.0 = Vec3::ZERO;
            return MoveOutcome {
                resolved: Vec3::ZERO,
                grounded: self.grounded,
            };
        }
        self.velocity.0 = displacement / self.dt;
        MoveOutcome {
            resolved: displacement,
            grounded: self.grounded,
        }
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }
}

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct MoveAgentSystemQuery {
    mover: &'static mut Mover,
    transform: &'static mut Transform,
    velocity: &'static mut LinearVelocity,
    ground_hits: Option<&'static ShapeHits>,
}

pub(crate) fn move_agents(time: Res<Time>, mut query: Query<MoveAgentSystemQuery>) {
    let dt = time.delta_secs();
    for mut query_item in query.iter_mut() {
        let mut body = VelocityBody::new(&mut query_item.velocity, query_item.ground_hits, dt);
        query_item
            .mover
            .update(dt, &mut body, &mut query_item.transform.rotation);
    }
}

/// Debug visualization for agent movement. Shows the movement
/// direction scaled by speed (cyan) and the current velocity (green).
pub(crate) fn debug_movement(
    mut gizmos: Gizmos,
    query: Query<(&GlobalTransform, &Mover, &LinearVelocity)>,
) {
    for (transform, mover, velocity) in query.iter() {
        let position = transform.translation();

        let heading_end = position + mover.direction() * mover.speed();
        gizmos.arrow(position, heading_end, Color::srgb(0.0, 1.0, 1.0));

        let velocity_end = position + **velocity;
        gizmos.arrow(position, velocity_end, Color::srgb(0.0, 1.0, 0.0));
    }
}
