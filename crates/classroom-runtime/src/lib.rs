//! # Classroom Runtime
//!
//! A headless ClassPoll context as a process.
//!
//! Every process started on the same data directory joins the same
//! classroom. The directory is the shared store: one file per key,
//! guarded by an advisory lock, watched for writes by other processes.
//!
//! ## Modules
//!
//! - `adapters/` - File-backed `SharedStore`
//! - `container/` - Configuration and context assembly
//! - `console` - JSON lines front end over stdin/stdout

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod console;
pub mod container;

pub use adapters::FileSharedStore;
pub use console::{run_console, ConsoleError};
pub use container::{ClassroomContext, RuntimeConfig, RuntimeConfigError, RuntimeError};
