//! Cross-crate integration tests.

#[cfg(test)]
mod support;

mod cross_context;
mod file_classroom;
mod scenarios;
mod storage_faults;
