//! # remote-commands
//!
//! Run shell command batches over one interactive SSH session.
//!
//! The remote shell is driven the way a person would drive it: a pseudo-
//! terminal is opened, the prompt is detected once, and each command's output
//! is read up to the next prompt and handed back line by line.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Named server registry loaded from JSON
//! - Prompt detection that tolerates directory changes (`[user@host path]$`)
//! - Efficient pattern buffer matching (tail search with ANSI stripping)
//! - Callback or `Stream` delivery of output lines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remote_commands::{Connector, ServerRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), remote_commands::Error> {
//!     let registry = ServerRegistry::from_path("servers.json")?;
//!     let session = Connector::new(registry).connect("web1").await?;
//!
//!     session
//!         .run(["cd /var/log", "ls -1"], |line| println!("{line}"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod transport;

// Re-export main types for convenience
pub use channel::{PromptMatcher, PromptPattern, detect_prompt};
pub use config::{AuthType, ConnectSettings, ServerConfig, ServerRegistry};
pub use driver::{Connector, OutputLine, Session, SessionOptions, process_output};
pub use error::{Error, ErrorKind, Result};
pub use transport::{HostKeyVerification, ScriptedTransport, SshTransport, Transport};
