//! Configuration loading and filesystem layout

pub mod loader;
pub mod paths;

pub use loader::load;
pub use paths::AgentPaths;
