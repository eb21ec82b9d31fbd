//! Agent session module
//!
//! Runs the agent runtime as a child process and speaks its stream-json
//! protocol over stdin/stdout.

mod client;
#[allow(dead_code)]
mod process;
#[allow(dead_code)]
mod protocol;

pub use client::*;
#[allow(unused_imports)]
pub use process::*;
pub use protocol::*;
