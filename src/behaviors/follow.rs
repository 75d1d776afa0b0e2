use bevy::{
    ecs::{lifecycle::HookContext, query::QueryData, world::DeferredWorld},
    prelude::*,
};
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mover::Mover;

/// Distances below this are treated as zero.
pub(crate) const NEAR_ZERO: f32 = 0.01;

/// Tag for the entity followers pick up when they have no explicit
/// target, e.g. the player.
#[derive(Component, Debug, Default, Copy, Clone, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[reflect(Component)]
pub struct FollowTarget;

/// Whether a [Follow] controller is currently steering its agent.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FollowState {
    /// Steering toward the target every tick.
    Following,
    /// Disabled, or the target is missing. The agent stands still.
    #[default]
    Idle,
}

/// Problems with a [Follow] configuration. None of these stop the
/// controller from running, but the approach degenerates to a
/// constant-speed approach.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum FollowConfigWarning {
    #[error(
        "slowing radius ({slowing_radius}) should be greater than the target distance \
         ({target_distance}) for the agent to slow down on approach"
    )]
    SlowingRadiusWithinTargetDistance {
        slowing_radius: f32,
        target_distance: f32,
    },
    #[error(
        "slowing radius ({slowing_radius}) should be greater than the arrival threshold \
         ({arrival_threshold}) for the agent to slow down on approach"
    )]
    SlowingRadiusWithinArrivalThreshold {
        slowing_radius: f32,
        arrival_threshold: f32,
    },
}

/// What a [Follow] controller wants its [Mover] to do this tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FollowCommand {
    /// Arrived: no direction, zero speed.
    Stop,
    /// Head along `direction` (horizontal, normalized) at `speed`.
    Steer { direction: Vec3, speed: f32 },
}

impl FollowCommand {
    pub fn apply(self, mover: &mut Mover) {
        match self {
            FollowCommand::Stop => {
                mover.stop();
                mover.set_speed(0.0);
            }
            FollowCommand::Steer { direction, speed } => {
                mover.set_direction(direction);
                mover.set_speed(speed);
            }
        }
    }
}

/// Follow behavior keeps the agent at a standoff distance from a target
/// entity. The agent steers toward a point `target_distance` short of the
/// target on the line between them, slows down once that point is inside
/// the slowing radius, and stops when it gets within the arrival threshold.
///
/// If no target is set, the first entity tagged with [FollowTarget] is
/// used. If there is none, the controller disables itself.
#[derive(Component, Debug, Copy, Clone, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
#[require(Mover)]
#[component(on_remove = on_follow_remove)]
#[reflect(Component)]
pub struct Follow {
    /// The entity being followed.
    pub target: Option<Entity>,
    /// How far from the target the agent tries to stay. 0.0 means
    /// the agent tries to reach the target's exact position.
    #[derivative(Default(value = "1.5"))]
    pub(crate) target_distance: f32,
    /// Radius around the target point inside which the agent slows down.
    #[derivative(Default(value = "5.0"))]
    pub(crate) slowing_radius: f32,
    /// The slowest the agent moves while slowing down. 0.0 lets it
    /// come to a full stop.
    #[derivative(Default(value = "0.2"))]
    pub(crate) min_speed_when_close: f32,
    /// Distance to the target point under which the agent has arrived.
    #[derivative(Default(value = "0.1"))]
    pub(crate) arrival_threshold: f32,
    #[derivative(Default(value = "true"))]
    pub(crate) enabled: bool,
    pub(crate) state: FollowState,
}

impl Follow {
    pub const TARGET_DISTANCE_RANGE: (f32, f32) = (0.0, 10.0);
    pub const SLOWING_RADIUS_RANGE: (f32, f32) = (0.5, 20.0);
    pub const MIN_SPEED_WHEN_CLOSE_RANGE: (f32, f32) = (0.0, 3.0);
    pub const ARRIVAL_THRESHOLD_RANGE: (f32, f32) = (0.01, 1.0);

    /// Create a new Follow behavior targeting the specified entity
    pub fn new(target: Entity) -> Self {
        Self {
            target: Some(target),
            ..Default::default()
        }
    }

    /// Set the distance to keep from the target, clamped to
    /// [0.0, 10.0]. (Default: 1.5)
    pub fn with_target_distance(self, distance: f32) -> Self {
        let (min, max) = Self::TARGET_DISTANCE_RANGE;
        Self {
            target_distance: distance.clamp(min, max),
            ..self
        }
    }

    /// Set the radius inside which the agent slows down, clamped to
    /// [0.5, 20.0]. (Default: 5.0)
    pub fn with_slowing_radius(self, radius: f32) -> Self {
        let (min, max) = Self::SLOWING_RADIUS_RANGE;
        Self {
            slowing_radius: radius.clamp(min, max),
            ..self
        }
    }

    /// Set the slowest speed used while slowing down, clamped to
    /// [0.0, 3.0]. (Default: 0.2)
    pub fn with_min_speed_when_close(self, speed: f32) -> Self {
        let (min, max) = Self::MIN_SPEED_WHEN_CLOSE_RANGE;
        Self {
            min_speed_when_close: speed.clamp(min, max),
            ..self
        }
    }

    /// Set the arrival threshold, clamped to [0.01, 1.0]. (Default: 0.1)
    pub fn with_arrival_threshold(self, threshold: f32) -> Self {
        let (min, max) = Self::ARRIVAL_THRESHOLD_RANGE;
        Self {
            arrival_threshold: threshold.clamp(min, max),
            ..self
        }
    }

    pub fn set_target(&mut self, target: Entity) {
        self.target = Some(target);
    }

    /// Turn following on or off. A disabled controller stops its
    /// agent on the next tick and stays idle until re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn target_distance(&self) -> f32 {
        self.target_distance
    }

    pub fn slowing_radius(&self) -> f32 {
        self.slowing_radius
    }

    pub fn min_speed_when_close(&self) -> f32 {
        self.min_speed_when_close
    }

    pub fn arrival_threshold(&self) -> f32 {
        self.arrival_threshold
    }

    /// Check that the slowing radius lies beyond the point where the
    /// agent stops.
    pub fn validate(&self) -> Result<(), FollowConfigWarning> {
        if self.target_distance > 0.0 {
            if self.slowing_radius <= self.target_distance {
                return Err(FollowConfigWarning::SlowingRadiusWithinTargetDistance {
                    slowing_radius: self.slowing_radius,
                    target_distance: self.target_distance,
                });
            }
        } else if self.slowing_radius <= self.arrival_threshold {
            return Err(FollowConfigWarning::SlowingRadiusWithinArrivalThreshold {
                slowing_radius: self.slowing_radius,
                arrival_threshold: self.arrival_threshold,
            });
        }
        Ok(())
    }

    /// The horizontal point the agent steers toward. The point sits
    /// `target_distance` short of the target on the line from the agent,
    /// whichever side of that distance the agent is on.
    pub fn target_point(&self, agent: Vec3, target: Vec3) -> Vec3 {
        let agent = agent.with_y(0.0);
        let target = target.with_y(0.0);
        if self.target_distance < NEAR_ZERO {
            return target;
        }
        target - (target - agent).normalize_or_zero() * self.target_distance
    }

    /// The distance to the target point at which the agent moves at
    /// its slowest.
    pub fn effective_min_distance(&self) -> f32 {
        if self.target_distance > 0.0 && self.arrival_threshold < self.target_distance {
            self.arrival_threshold
        } else {
            NEAR_ZERO
        }
    }

    /// The speed to move at when `distance` away from the target point.
    /// Full speed outside the slowing radius, then a linear ramp down to
    /// `min_speed_when_close` at [Follow::effective_min_distance].
    pub fn desired_speed(&self, distance: f32, base_speed: f32) -> f32 {
        if distance >= self.slowing_radius {
            return base_speed;
        }
        let min_distance = self.effective_min_distance();
        let range = self.slowing_radius - min_distance;
        if range <= NEAR_ZERO {
            return base_speed;
        }
        let t = ((distance - min_distance) / range).clamp(0.0, 1.0);
        self.min_speed_when_close.lerp(base_speed, t)
    }

    /// Decide what the agent at `agent` should do to follow a target at
    /// `target`. Only the horizontal components are used.
    pub fn steer(&self, agent: Vec3, target: Vec3, base_speed: f32) -> FollowCommand {
        let agent = agent.with_y(0.0);
        let distance_to_target = agent.distance(target.with_y(0.0));

        // Already on top of the target and that's where we want to be
        if distance_to_target < NEAR_ZERO && self.target_distance < NEAR_ZERO {
            return FollowCommand::Stop;
        }

        let to_point = self.target_point(agent, target) - agent;
        let distance = to_point.length();
        if distance < self.arrival_threshold {
            return FollowCommand::Stop;
        }

        FollowCommand::Steer {
            direction: to_point.normalize_or_zero(),
            speed: self.desired_speed(distance, base_speed),
        }
    }

    fn transition(&mut self, entity: Entity, state: FollowState) {
        if self.state != state {
            debug!("Follow on {entity}: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

/// Resolve targets for newly added [Follow] controllers and report
/// configuration problems once.
pub(crate) fn resolve_targets(
    mut query: Query<(Entity, &mut Follow), Added<Follow>>,
    tagged: Query<Entity, With<FollowTarget>>,
    positioned: Query<(), With<GlobalTransform>>,
) {
    for (entity, mut follow) in query.iter_mut() {
        if let Err(warning) = follow.validate() {
            warn!("Follow on {entity}: {warning}");
        }

        if follow.target.is_some_and(|target| positioned.contains(target)) {
            continue;
        }

        match tagged.iter().find(|&target| target != entity) {
            Some(target) => {
                debug!("Follow on {entity}: following tagged entity {target}");
                follow.target = Some(target);
            }
            None => {
                error!(
                    "Follow on {entity}: no target assigned and no entity tagged with \
                     FollowTarget, following disabled"
                );
                follow.enabled = false;
                follow.transition(entity, FollowState::Idle);
            }
        }
    }
}

#[derive(QueryData)]
#[query_data(mutable)]
pub struct FollowBehaviorAgentQuery {
    entity: Entity,
    follow: &'static mut Follow,
    mover: &'static mut Mover,
    global_transform: &'static GlobalTransform,
}

/// Follow behavior steers each agent toward its target point and
/// shapes its speed. Disabled controllers, and controllers whose
/// target has disappeared, hold their agent still.
pub(crate) fn run(
    mut agent_query: Query<FollowBehaviorAgentQuery>,
    target_query: Query<&GlobalTransform>,
) {
    for mut item in agent_query.iter_mut() {
        let target_position = item
            .follow
            .target
            .filter(|_| item.follow.enabled)
            .and_then(|target| target_query.get(target).ok())
            .map(GlobalTransform::translation);

        let Some(target_position) = target_position else {
            item.follow.transition(item.entity, FollowState::Idle);
            FollowCommand::Stop.apply(&mut item.mover);
            continue;
        };

        item.follow.transition(item.entity, FollowState::Following);
        let agent_position = item.global_transform.translation();
        let base_speed = item.mover.base_speed();
        let command = item
            .follow
            .steer(agent_position, target_position, base_speed);
        command.apply(&mut item.mover);
    }
}

fn draw_circle(gizmos: &mut Gizmos, center: Vec3, radius: f32, color: Color) {
    let segments = 32;
    for i in 0..segments {
        let angle1 = (i as f32 / segments as f32) * std::f32::consts::TAU;
        let angle2 = ((i + 1) as f32 / segments as f32) * std::f32::consts::TAU;
        let p1 = center + Vec3::new(angle1.cos() * radius, 0.0, angle1.sin() * radius);
        let p2 = center + Vec3::new(angle2.cos() * radius, 0.0, angle2.sin() * radius);
        gizmos.line(p1, p2, color);
    }
}

/// Draws the arrival threshold around each follower (red), a line to
/// its target (blue), the standoff distance around the target (green)
/// or the slowing radius when there is no standoff (cyan), and the
/// current target point (magenta).
pub(crate) fn debug_follow(
    mut gizmos: Gizmos,
    follower_query: Query<(&GlobalTransform, &Follow)>,
    target_query: Query<&GlobalTransform>,
) {
    for (follower_transform, follow) in follower_query.iter() {
        let follower_pos = follower_transform.translation();
        draw_circle(
            &mut gizmos,
            follower_pos,
            follow.arrival_threshold,
            Color::srgb(1.0, 0.0, 0.0),
        );

        let Some(target_entity) = follow.target else {
            continue;
        };
        let Ok(target_transform) = target_query.get(target_entity) else {
            continue;
        };
        let target_pos = target_transform.translation();

        gizmos.line(follower_pos, target_pos, Color::srgb(0.0, 0.0, 1.0));

        if follow.target_distance > NEAR_ZERO {
            draw_circle(
                &mut gizmos,
                target_pos,
                follow.target_distance,
                Color::srgb(0.0, 1.0, 0.0),
            );
        } else {
            draw_circle(
                &mut gizmos,
                target_pos,
                follow.slowing_radius,
                Color::srgb(0.0, 1.0, 1.0),
            );
        }

        let target_point = follow
            .target_point(follower_pos, target_pos)
            .with_y(follower_pos.y);
        draw_circle(&mut gizmos, target_point, 0.3, Color::srgb(1.0, 0.0, 1.0));
    }
}

fn on_follow_remove(mut world: DeferredWorld, HookContext { entity, .. }: HookContext) {
    if let Some(mut mover) = world.get_mut::<Mover>(entity) {
        FollowCommand::Stop.apply(&mut mover);
    }
}
