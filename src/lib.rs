//! gradle-cache - Gradle build state caching for CI
//!
//! Restores the Gradle User Home and project state at the start of a job
//! and saves them at the end, keyed so that later jobs reuse the closest
//! earlier snapshot.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;

pub use error::{GradleCacheError, GradleCacheResult};
