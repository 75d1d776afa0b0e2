use avian3d::prelude::LinearVelocity;
use bevy::prelude::*;
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    SMALL_THRESHOLD,
    body::{CharacterBody, MoveOutcome},
};

/// Vertical velocity applied while grounded, so the body stays
/// pressed against the floor instead of hovering above it.
pub(crate) const GROUND_CONTACT_VELOCITY: f32 = -2.0;

/// Owns the horizontal movement of a single agent: which way it is
/// heading, how fast, its vertical velocity under gravity and how
/// quickly it turns to face where it is going. Something else
/// (a [Follow](crate::behaviors::follow::Follow) controller, player input)
/// decides the direction and speed; the mover integrates them.
#[derive(Component, Clone, Debug, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
#[require(Transform, LinearVelocity)]
#[reflect(Component)]
pub struct Mover {
    /// The configured speed. Controllers shape [Mover::speed] relative
    /// to this value.
    #[derivative(Default(value = "3.0"))]
    pub(crate) base_speed: f32,
    /// The speed currently used for movement. Never negative.
    #[derivative(Default(value = "3.0"))]
    pub(crate) speed: f32,
    /// How quickly the agent turns to face its movement direction.
    /// Used as a per-second slerp fraction.
    #[derivative(Default(value = "7.0"))]
    pub(crate) rotation_speed: f32,
    /// Downward acceleration, as a positive number.
    #[derivative(Default(value = "9.81"))]
    pub(crate) gravity: f32,
    /// Whether the agent rotates to face its movement direction.
    #[derivative(Default(value = "true"))]
    pub(crate) face_movement: bool,
    /// Horizontal unit vector, or zero when standing still.
    pub(crate) direction: Vec3,
    pub(crate) vertical_velocity: f32,
    /// Last grounded state reported by the body.
    pub(crate) grounded: bool,
}

impl Mover {
    pub const BASE_SPEED_RANGE: (f32, f32) = (1.0, 10.0);
    pub const ROTATION_SPEED_RANGE: (f32, f32) = (1.0, 15.0);
    pub const GRAVITY_RANGE: (f32, f32) = (1.0, 20.0);

    /// Set the base speed of the agent, clamped to [1.0, 10.0]. The
    /// current speed is reset to the new base speed.
    pub fn with_base_speed(self, speed: f32) -> Self {
        let (min, max) = Self::BASE_SPEED_RANGE;
        let speed = speed.clamp(min, max);
        Self {
            base_speed: speed,
            speed,
            ..self
        }
    }

    /// Set how quickly the agent turns to face its movement
    /// direction, clamped to [1.0, 15.0].
    pub fn with_rotation_speed(self, rotation_speed: f32) -> Self {
        let (min, max) = Self::ROTATION_SPEED_RANGE;
        Self {
            rotation_speed: rotation_speed.clamp(min, max),
            ..self
        }
    }

    /// Set the gravity applied to the agent, clamped to [1.0, 20.0].
    pub fn with_gravity(self, gravity: f32) -> Self {
        let (min, max) = Self::GRAVITY_RANGE;
        Self {
            gravity: gravity.clamp(min, max),
            ..self
        }
    }

    /// Choose whether the agent turns to face where it is moving
    /// (the default). Player-driven agents usually turn from look
    /// input instead.
    pub fn with_face_movement(self, face_movement: bool) -> Self {
        Self {
            face_movement,
            ..self
        }
    }

    /// Set the movement direction. The vector is projected onto the
    /// horizontal plane and normalized. A vector without a horizontal
    /// component stops the agent.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    }

    /// Stop moving horizontally. Gravity still applies.
    pub fn stop(&mut self) {
        self.direction = Vec3::ZERO;
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the current speed. Negative values are treated as 0.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }

    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Jump high enough to reach `height` under this mover's gravity.
    /// Only possible while grounded. Returns whether the jump happened.
    pub fn jump(&mut self, height: f32) -> bool {
        if !self.grounded || height <= 0.0 {
            return false;
        }
        self.vertical_velocity = (2.0 * self.gravity * height).sqrt();
        self.grounded = false;
        true
    }

    /// The rotation that faces the current movement direction, if any.
    /// Forward is -Z.
    pub fn heading(&self) -> Option<Quat> {
        if self.direction.length_squared() < SMALL_THRESHOLD {
            return None;
        }
        Some(Quat::from_rotation_y(f32::atan2(
            -self.direction.x,
            -self.direction.z,
        )))
    }

    /// Advance the mover by `dt` seconds: integrate gravity, hand the
    /// resulting displacement to `body`, then turn `rotation` toward the
    /// movement direction.
    pub fn update(
        &mut self,
        dt: f32,
        body: &mut impl CharacterBody,
        rotation: &mut Quat,
    ) -> MoveOutcome {
        self.apply_gravity(dt, body.is_grounded());

        let velocity = self.direction * self.speed + Vec3::Y * self.vertical_velocity;
        let outcome = body.try_move(velocity * dt);
        self.grounded = outcome.grounded;

        if let Some(heading) = self.heading().filter(|_| self.face_movement) {
            let blend = (self.rotation_speed * dt).clamp(0.0, 1.0);
            *rotation = rotation.slerp(heading, blend);
        }

        outcome
    }

    fn apply_gravity(&mut self, dt: f32, grounded: bool) {
        if grounded && self.vertical_velocity < 0.0 {
            self.vertical_velocity = GROUND_CONTACT_VELOCITY;
        } else {
            self.vertical_velocity -= self.gravity * dt;
        }
    }
}
