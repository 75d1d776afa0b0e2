use bevy::{
    ecs::{lifecycle::HookContext, world::DeferredWorld},
    prelude::*,
};
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{SMALL_THRESHOLD, mover::Mover};

/// Input magnitude under which the player counts as standing still.
const MOVE_DEADZONE: f32 = 0.1;

/// Drives a [Mover] from player input. Whatever polls the input device
/// calls [PlayerLocomotion::set_move_input], [PlayerLocomotion::add_look],
/// [PlayerLocomotion::set_running] and [PlayerLocomotion::request_jump];
/// the plugin applies them on the next tick.
///
/// Movement is relative to the agent's facing, and the agent turns from
/// look input only. Adding this component switches off
/// [Mover::with_face_movement] on the agent.
#[derive(Component, Clone, Debug, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
#[require(Mover)]
#[component(on_add = on_player_add)]
#[reflect(Component)]
pub struct PlayerLocomotion {
    #[derivative(Default(value = "3.0"))]
    pub walk_speed: f32,
    #[derivative(Default(value = "8.0"))]
    pub run_speed: f32,
    /// Radians of rotation per unit of look input.
    #[derivative(Default(value = "0.01"))]
    pub look_sensitivity: f32,
    /// How far up or down the player can look, in radians.
    #[derivative(Default(value = "std::f32::consts::FRAC_PI_4"))]
    pub pitch_limit: f32,
    #[derivative(Default(value = "1.0"))]
    pub jump_height: f32,
    pub(crate) move_input: Vec2,
    pub(crate) look_input: Vec2,
    pub(crate) running: bool,
    pub(crate) jump_requested: bool,
    pub(crate) pitch: f32,
    pub(crate) moving: bool,
}

impl PlayerLocomotion {
    pub const WALK_SPEED_RANGE: (f32, f32) = (1.0, 10.0);
    pub const RUN_SPEED_RANGE: (f32, f32) = (1.0, 10.0);
    /// One degree up to straight up or down.
    pub const PITCH_LIMIT_RANGE: (f32, f32) = (0.017_453_292, std::f32::consts::FRAC_PI_2);

    /// Set the walk and run speeds, each clamped to [1.0, 10.0].
    pub fn with_speeds(self, walk_speed: f32, run_speed: f32) -> Self {
        let (walk_min, walk_max) = Self::WALK_SPEED_RANGE;
        let (run_min, run_max) = Self::RUN_SPEED_RANGE;
        Self {
            walk_speed: walk_speed.clamp(walk_min, walk_max),
            run_speed: run_speed.clamp(run_min, run_max),
            ..self
        }
    }

    pub fn with_look_sensitivity(self, look_sensitivity: f32) -> Self {
        Self {
            look_sensitivity,
            ..self
        }
    }

    /// Set how far up or down the player can look, in radians. The sign
    /// is ignored and the limit is clamped to [1, 90] degrees.
    pub fn with_pitch_limit(self, pitch_limit: f32) -> Self {
        let (min, max) = Self::PITCH_LIMIT_RANGE;
        Self {
            pitch_limit: pitch_limit.abs().clamp(min, max),
            ..self
        }
    }

    pub fn with_jump_height(self, jump_height: f32) -> Self {
        Self {
            jump_height,
            ..self
        }
    }

    /// Movement input, x to the right and y forward. Longer than 1.0
    /// is treated as 1.0.
    pub fn set_move_input(&mut self, input: Vec2) {
        self.move_input = input;
    }

    /// Accumulate look input, x to the right and y up. Consumed on the
    /// next tick.
    pub fn add_look(&mut self, delta: Vec2) {
        self.look_input += delta;
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Jump on the next tick, if the agent is on the ground by then.
    pub fn request_jump(&mut self) {
        self.jump_requested = true;
    }

    /// Look pitch in radians, positive up. The agent itself only yaws;
    /// apply this to a camera or head.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Whether the player was walking or running on the ground on the
    /// last tick.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn target_speed(&self) -> f32 {
        if self.running {
            self.run_speed
        } else {
            self.walk_speed
        }
    }
}

pub(crate) fn player_locomotion(
    mut query: Query<(&mut PlayerLocomotion, &mut Mover, &mut Transform)>,
) {
    for (mut player, mut mover, mut transform) in query.iter_mut() {
        let look = std::mem::take(&mut player.look_input) * player.look_sensitivity;
        let limit = player.pitch_limit;
        player.pitch = (player.pitch + look.y).clamp(-limit, limit);
        transform.rotate_y(-look.x);

        let input = player.move_input.clamp_length_max(1.0);
        let wish = transform.right() * input.x + transform.forward() * input.y;
        if wish.length_squared() > SMALL_THRESHOLD {
            mover.set_direction(wish);
            mover.set_speed(player.target_speed() * input.length());
        } else {
            mover.stop();
        }
        player.moving = mover.is_grounded() && input.length() > MOVE_DEADZONE;

        if std::mem::take(&mut player.jump_requested) {
            let height = player.jump_height;
            mover.jump(height);
        }
    }
}

fn on_player_add(mut world: DeferredWorld, HookContext { entity, .. }: HookContext) {
    if let Some(mut mover) = world.get_mut::<Mover>(entity) {
        mover.face_movement = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    use crate::mover::tests::MockBody;

    fn spawn_player(world: &mut World, player: PlayerLocomotion) -> Entity {
        world.spawn((player, Transform::default())).id()
    }

    fn tick(world: &mut World) {
        world
            .run_system_once(player_locomotion)
            .expect("Failed to run player_locomotion system");
    }

    #[test]
    fn test_adding_player_disables_face_movement() {
        let mut world = World::new();
        let player = world
            .spawn((PlayerLocomotion::default(), Mover::default()))
            .id();
        assert!(!world.get::<Mover>(player).unwrap().face_movement);
    }

    #[test]
    fn test_move_input_relative_to_facing() {
        let mut world = World::new();
        let player = spawn_player(&mut world, PlayerLocomotion::default());

        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .set_move_input(Vec2::new(0.0, 1.0));
        tick(&mut world);

        let mover = world.get::<Mover>(player).unwrap();
        assert!(mover.direction().abs_diff_eq(Vec3::NEG_Z, 0.0001));
        assert_eq!(mover.speed(), 3.0);

        // Facing +X, strafing right heads toward +Z
        world.get_mut::<Transform>(player).unwrap().rotation =
            Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2);
        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .set_move_input(Vec2::new(1.0, 0.0));
        tick(&mut world);

        let mover = world.get::<Mover>(player).unwrap();
        assert!(
            mover.direction().abs_diff_eq(Vec3::Z, 0.0001),
            "Got: {:?}",
            mover.direction()
        );
    }

    #[test]
    fn test_running_and_partial_input() {
        let mut world = World::new();
        let player = spawn_player(
            &mut world,
            PlayerLocomotion::default().with_speeds(2.0, 6.0),
        );

        {
            let mut locomotion = world.get_mut::<PlayerLocomotion>(player).unwrap();
            locomotion.set_running(true);
            locomotion.set_move_input(Vec2::new(0.0, 0.5));
        }
        tick(&mut world);
        assert!((world.get::<Mover>(player).unwrap().speed() - 3.0).abs() < 0.0001);

        // Diagonal input is not faster than straight input
        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .set_move_input(Vec2::new(1.0, 1.0));
        tick(&mut world);
        assert!((world.get::<Mover>(player).unwrap().speed() - 6.0).abs() < 0.0001);
    }

    #[test]
    fn test_builders_clamp_to_ranges() {
        let locomotion = PlayerLocomotion::default()
            .with_speeds(0.0, 25.0)
            .with_pitch_limit(-3.0);
        assert_eq!(locomotion.walk_speed, 1.0);
        assert_eq!(locomotion.run_speed, 10.0);
        assert_eq!(locomotion.pitch_limit, std::f32::consts::FRAC_PI_2);

        let locomotion = PlayerLocomotion::default()
            .with_speeds(-4.0, 0.5)
            .with_pitch_limit(0.0);
        assert_eq!(locomotion.walk_speed, 1.0);
        assert_eq!(locomotion.run_speed, 1.0);
        assert!((locomotion.pitch_limit - 1.0_f32.to_radians()).abs() < 0.0001);

        // In-range values pass through
        let locomotion = PlayerLocomotion::default()
            .with_speeds(2.0, 6.0)
            .with_pitch_limit(-0.5);
        assert_eq!(locomotion.walk_speed, 2.0);
        assert_eq!(locomotion.run_speed, 6.0);
        assert_eq!(locomotion.pitch_limit, 0.5);
    }

    #[test]
    fn test_no_input_stops() {
        let mut world = World::new();
        let player = spawn_player(&mut world, PlayerLocomotion::default());
        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .set_move_input(Vec2::Y);
        tick(&mut world);

        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .set_move_input(Vec2::ZERO);
        tick(&mut world);

        assert_eq!(world.get::<Mover>(player).unwrap().direction(), Vec3::ZERO);
        assert!(!world.get::<PlayerLocomotion>(player).unwrap().is_moving());
    }

    #[test]
    fn test_look_yaws_agent_and_clamps_pitch() {
        let mut world = World::new();
        let player = spawn_player(
            &mut world,
            PlayerLocomotion::default()
                .with_look_sensitivity(1.0)
                .with_pitch_limit(0.5),
        );

        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .add_look(Vec2::new(std::f32::consts::FRAC_PI_2, 2.0));
        tick(&mut world);

        let locomotion = world.get::<PlayerLocomotion>(player).unwrap();
        assert_eq!(locomotion.pitch(), 0.5);
        assert_eq!(locomotion.look_input, Vec2::ZERO);

        // Looking right turns the agent to face +X
        let forward = world.get::<Transform>(player).unwrap().forward();
        assert!(forward.abs_diff_eq(Vec3::X, 0.0001), "Got: {:?}", forward);
    }

    #[test]
    fn test_jump_request_is_consumed() {
        let mut world = World::new();
        let player = spawn_player(
            &mut world,
            PlayerLocomotion::default().with_jump_height(1.8),
        );

        // Put the mover on the ground first
        {
            let mut mover = world.get_mut::<Mover>(player).unwrap();
            let mut body = MockBody {
                grounded: true,
                ..default()
            };
            let mut rotation = Quat::IDENTITY;
            mover.update(0.1, &mut body, &mut rotation);
        }

        world
            .get_mut::<PlayerLocomotion>(player)
            .unwrap()
            .request_jump();
        tick(&mut world);

        let mover = world.get::<Mover>(player).unwrap();
        assert!(mover.vertical_velocity() > 0.0);
        assert!(!world.get::<PlayerLocomotion>(player).unwrap().jump_requested);
    }
}
