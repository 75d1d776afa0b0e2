mod behaviors;
mod body;
mod movement;
mod mover;
mod player;
mod plugin;
pub mod prelude;

pub(crate) const SMALL_THRESHOLD: f32 = 0.0001;
