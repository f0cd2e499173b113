//! Attendance tracker CLI library.
//!
//! This crate provides the CLI interface for the attendance tracker.

mod cli;
pub mod commands;
mod config;
mod store;

pub use cli::{AttendanceAction, Cli, Commands, SessionAction, StudentAction};
pub use config::Config;
