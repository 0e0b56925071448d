//! # ClassPoll Test Suite
//!
//! Unified test crate for behaviour that spans more than one crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs         # Fixtures: contexts on a shared store
//!     ├── scenarios.rs       # Classroom walkthroughs on one context
//!     ├── cross_context.rs   # Several contexts on one store
//!     ├── storage_faults.rs  # Failing or corrupted shared storage
//!     └── file_classroom.rs  # Contexts on a shared data directory
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cp-tests
//!
//! # By area
//! cargo test -p cp-tests integration::cross_context::
//! ```

pub mod integration;
