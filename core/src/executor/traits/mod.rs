pub mod body;
pub mod renderer;
pub mod strategy;

pub use body::*;
pub use renderer::*;
pub use strategy::*;
