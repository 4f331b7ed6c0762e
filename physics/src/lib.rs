pub mod arbiter;
pub mod body;
mod collide;
pub mod contact;
pub mod joint;
mod math;
pub mod world;

pub use glam;
