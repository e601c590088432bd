//! Byte transports underneath a session.
//!
//! A [`Transport`] is the raw, bidirectional byte stream of one interactive
//! shell. [`SshTransport`] provides it over russh; [`ScriptedTransport`]
//! replays canned output for tests.

pub mod config;
pub mod scripted;
mod ssh;

use std::future::Future;
use std::time::Duration;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use scripted::{ScriptHandle, ScriptedTransport};
pub use ssh::SshTransport;

use crate::error::{ChannelError, Result};

/// Raw byte stream of one interactive shell.
pub trait Transport: Send {
    /// Write bytes to the shell's input.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = std::result::Result<(), ChannelError>> + Send;

    /// Wait for the next chunk of output.
    ///
    /// Fails with [`ChannelError::IdleTimeout`] if nothing arrives within
    /// `idle`, and with [`ChannelError::Closed`] once the remote side hangs up.
    fn read_chunk(
        &mut self,
        idle: Duration,
    ) -> impl Future<Output = std::result::Result<Vec<u8>, ChannelError>> + Send;

    /// Release the underlying connection.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}
