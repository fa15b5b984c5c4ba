//! Taskboard sync library
//!
//! Client-side synchronization of a hosted projects/tasks board: remote
//! store adapters, optimistic collections, derived views, and the CLI and
//! dashboard API built on them.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod logging;
pub mod store;
pub mod sync;
pub mod team;
pub mod types;
pub mod views;
