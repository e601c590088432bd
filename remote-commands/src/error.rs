//! Error types for remote-commands.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by fallible line callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for remote-commands operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Server configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors (prompt detection, command execution)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Coarse classification of an [`Error`], for callers that only care about
/// which stage of a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server name could not be resolved to a usable descriptor.
    Configuration,
    /// The remote side rejected the login.
    Authentication,
    /// Prompt detection ran out of its overall budget.
    Timeout,
    /// A read failed or idled out while detecting the prompt or running a command.
    Read,
    /// Connection setup, host key, or write failures.
    Connection,
    /// A caller-supplied line callback aborted the batch.
    Callback,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::Transport(TransportError::AuthenticationFailed { .. })
            | Error::Transport(TransportError::Key(_)) => ErrorKind::Authentication,
            Error::Transport(_) => ErrorKind::Connection,
            Error::Channel(ChannelError::IdleTimeout(_)) | Error::Channel(ChannelError::Closed) => {
                ErrorKind::Read
            }
            Error::Channel(_) => ErrorKind::Connection,
            Error::Session(SessionError::PromptTimeout(_)) => ErrorKind::Timeout,
            Error::Session(SessionError::ReadFailed { .. }) => ErrorKind::Read,
            Error::Session(SessionError::WriteFailed { .. }) => ErrorKind::Connection,
            Error::Session(SessionError::Callback { .. }) => ErrorKind::Callback,
        }
    }

    /// The command that was in flight when this error occurred, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Session(SessionError::ReadFailed { command, .. }) => command.as_deref(),
            Error::Session(SessionError::WriteFailed { command, .. })
            | Error::Session(SessionError::Callback { command, .. }) => Some(command),
            _ => None,
        }
    }
}

/// Server registry errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No descriptor registered under this name
    #[error("No configuration found for server [{name}]")]
    UnknownServer { name: String },

    /// The credential required by the server's auth type is absent
    #[error("Server [{server}] is missing required field '{field}'")]
    MissingCredential { server: String, field: &'static str },

    /// Failed to read a registry file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Registry document is not valid
    #[error("Invalid server registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server is not in known_hosts and strict checking is enabled
    #[error("Host {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (reads, writes, pattern compilation).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No data arrived within the idle timeout
    #[error("No data received within {0:?}")]
    IdleTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (prompt detection, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Prompt detection found no line within its overall budget
    #[error("Timeout waiting for prompt after {0:?}")]
    PromptTimeout(Duration),

    /// A read failed; `command` is `None` while detecting the prompt
    #[error("{}", read_failed_message(.command))]
    ReadFailed {
        command: Option<String>,
        #[source]
        source: ChannelError,
    },

    /// Writing a command to the channel failed
    #[error("SSH write failed while sending command: {command}")]
    WriteFailed {
        command: String,
        #[source]
        source: ChannelError,
    },

    /// The line callback returned an error
    #[error("Line callback aborted command: {command}")]
    Callback {
        command: String,
        #[source]
        source: BoxError,
    },
}

fn read_failed_message(command: &Option<String>) -> String {
    match command {
        Some(command) => format!("SSH read failed while running command: {command}"),
        None => "SSH read failed while detecting prompt".to_string(),
    }
}

/// Result type alias using remote-commands' Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failed_names_command() {
        let err: Error = SessionError::ReadFailed {
            command: Some("uptime".to_string()),
            source: ChannelError::IdleTimeout(Duration::from_secs(10)),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Read);
        assert_eq!(err.command(), Some("uptime"));
        assert!(err.to_string().contains("uptime"));
    }

    #[test]
    fn test_detection_read_has_no_command() {
        let err: Error = SessionError::ReadFailed {
            command: None,
            source: ChannelError::Closed,
        }
        .into();

        assert_eq!(err.command(), None);
        assert!(err.to_string().contains("detecting prompt"));
    }

    #[test]
    fn test_kinds() {
        let err: Error = ConfigError::UnknownServer {
            name: "db".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: Error = TransportError::AuthenticationFailed {
            user: "deploy".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let err: Error = SessionError::PromptTimeout(Duration::from_secs(10)).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
