//! Utility functions for status formatting.

pub mod format;

pub use format::{age_display, format_bytes, truncate_string};
