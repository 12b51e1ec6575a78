//! Card time tracker CLI library.
//!
//! This crate provides the CLI interface and a file-backed board host for
//! the card time tracker.

pub mod board;
mod cli;
pub mod commands;
mod config;
pub mod tracker;

pub use board::BoardFile;
pub use cli::{Cli, Commands};
pub use config::Config;
pub use tracker::Tracker;
