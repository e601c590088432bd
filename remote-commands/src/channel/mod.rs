//! Channel layer for pattern matching and PTY operations.
//!
//! This module turns the raw transport byte stream into prompt-delimited
//! reads: it strips ANSI escapes, detects the shell prompt, and compiles it
//! into a reusable pattern.

mod buffer;
mod detect;
mod patterns;
mod pty;

pub use buffer::PatternBuffer;
pub use detect::{detect_prompt, pick_prompt_line};
pub use patterns::{PromptMatcher, PromptPattern, Terminator};
pub use pty::{PtyChannel, PtyConfig};
