pub mod graph;
pub mod hooks;
pub mod simulator;

pub use graph::*;
pub use hooks::*;
pub use simulator::*;
