//! Configuration module
//!
//! Agent options, project config file, environment loading and the scripted
//! prompts that define the assistant.

mod env;
mod options;
mod project;
pub mod prompts;

pub use env::*;
pub use options::*;
pub use project::*;
