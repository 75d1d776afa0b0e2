pub use crate::{
    behaviors::follow::{Follow, FollowCommand, FollowConfigWarning, FollowState, FollowTarget},
    body::{CharacterBody, MoveOutcome},
    movement::character_capsule,
    mover::Mover,
    player::PlayerLocomotion,
    plugin::{DebugFollowPlugin, DebugFollowSystems, FollowPlugin, FollowSystems},
};
