pub mod simulated;

pub use simulated::{ScriptedFlag, SimulatedTaskBody};
