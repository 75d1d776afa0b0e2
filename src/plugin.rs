use bevy::prelude::*;

use crate::{
    behaviors::follow::{self, debug_follow},
    movement::{debug_movement, move_agents},
    player::player_locomotion,
};

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct FollowSystems;

/// Runs follow controllers, player locomotion and character movement
/// on the fixed timestep. Add avian3d's `PhysicsPlugins` alongside it.
pub struct FollowPlugin;

impl Plugin for FollowPlugin {
    fn build(&self, app: &mut App) {
        let update_systems = (
            follow::resolve_targets,
            follow::run,
            player_locomotion,
            move_agents,
        )
            .chain()
            .in_set(FollowSystems);
        app.add_systems(FixedUpdate, update_systems);
    }
}

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct DebugFollowSystems;

pub struct DebugFollowPlugin;

impl Plugin for DebugFollowPlugin {
    fn build(&self, app: &mut App) {
        let debug_systems = (debug_follow, debug_movement).in_set(DebugFollowSystems);
        app.add_systems(Update, debug_systems);
    }
}
