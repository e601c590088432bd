//! High-level API for running command batches.
//!
//! A [`Connector`] resolves a server name and opens a [`Session`]; the
//! session detects the shell prompt once and runs a batch of commands,
//! delivering their output line by line.

mod connector;
mod runner;
mod session;
mod stream;

pub use connector::Connector;
pub use runner::process_output;
pub use session::{Session, SessionOptions};
pub use stream::OutputLine;
