//! # Runtime Adapters
//!
//! `SharedStore` implementations that reach beyond one process.

pub mod file_store;

pub use file_store::FileSharedStore;
