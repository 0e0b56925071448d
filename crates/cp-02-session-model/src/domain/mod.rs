//! Domain layer for the session model.

pub mod errors;
pub mod limits;
pub mod session;
pub mod snapshot;
