//! Sandbox execution using Isolate
//!
//! Wrapper around the isolate sandbox for secure code execution: a bounded
//! pool of box ids, single-use sessions, and structured result parsing.
//!
//! See: https://github.com/ioi/isolate

pub mod meta;
pub mod pool;
pub mod session;

pub use meta::RunOutcome;
pub use pool::BoxPool;
pub use session::{DirMount, RunLimits, SandboxSession, SandboxSpec};
