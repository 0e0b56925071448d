//! # Shared Types Crate
//!
//! This crate contains the classroom entities and the closed command set
//! that every context speaks.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Closed Vocabulary**: Commands are a tagged enum with one strongly-typed
//!   payload per variant; there is no free-form command channel.
//! - **Names Are Identity**: Students are addressed by display name, compared
//!   case-insensitively via [`names::name_key`].

pub mod commands;
pub mod entities;
pub mod names;

pub use commands::Command;
pub use entities::*;
pub use names::{display_name, name_key, same_name};
