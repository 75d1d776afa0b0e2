use bevy::prelude::*;

/// The result of asking a [CharacterBody] to move.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct MoveOutcome {
    /// The displacement the body actually performed (or will perform)
    /// after collisions have been resolved.
    pub resolved: Vec3,
    /// Whether the body is standing on something after the move.
    pub grounded: bool,
}

/// The movement primitive a [Mover](crate::mover::Mover) drives. An
/// implementation owns collision resolution: walls, slopes and floors
/// are its business, the steering code only asks for a displacement
/// and reads back whether the body ended up on the ground.
///
/// The plugin implements this on top of avian3d. Anything else (a
/// test double, a custom kinematic controller) can implement it to
/// reuse the movement logic.
pub trait CharacterBody {
    /// Try to move the body by `displacement` this tick.
    fn try_move(&mut self, displacement: Vec3) -> MoveOutcome;

    /// Whether the body is currently touching the ground.
    fn is_grounded(&self) -> bool;
}
