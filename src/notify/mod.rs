//! Output for analysis results.
//!
//! This module handles:
//! - Colored console listings of recovered functions
//! - Per-bundle summaries and progress reporting

pub mod console;

pub use console::ConsoleOutput;
