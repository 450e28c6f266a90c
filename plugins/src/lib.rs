pub mod bodies;
pub mod executor;
pub mod factory;
