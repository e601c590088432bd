//! Opens sessions to named servers.

use std::time::Duration;

use log::debug;

use super::session::{Session, SessionOptions};
use crate::config::{ConnectSettings, ServerRegistry};
use crate::error::Result;
use crate::transport::SshTransport;

/// Factory for [`Session`]s on the servers of a [`ServerRegistry`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use remote_commands::{Connector, ServerRegistry};
///
/// # async fn example() -> Result<(), remote_commands::Error> {
/// let connector = Connector::new(ServerRegistry::from_path("servers.json")?)
///     .connect_timeout(Duration::from_secs(5))
///     .idle_timeout(Duration::from_secs(30));
///
/// let session = connector.connect("web1").await?;
/// session.run(["uptime"], |line| println!("{line}")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Connector {
    registry: ServerRegistry,
    options: SessionOptions,
    settings: ConnectSettings,
}

impl Connector {
    /// Create a connector with default timeouts.
    pub fn new(registry: ServerRegistry) -> Self {
        Self {
            registry,
            options: SessionOptions::default(),
            settings: ConnectSettings::default(),
        }
    }

    /// Set the per-read idle timeout (default: 10s).
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = timeout;
        self
    }

    /// Set the prompt detection budget (default: 10s).
    pub fn detect_timeout(mut self, timeout: Duration) -> Self {
        self.options.detect_timeout = timeout;
        self
    }

    /// Set the time allowed for connecting, logging in and starting the shell
    /// (default: 30s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.settings.terminal_width = width;
        self.settings.terminal_height = height;
        self
    }

    /// Replace all session options at once.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// The server registry.
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Connect to the named server and open an interactive shell.
    ///
    /// Unknown names and missing credentials fail before any network
    /// activity.
    pub async fn connect(&self, name: &str) -> Result<Session<SshTransport>> {
        let config = self.registry.resolve(name, &self.settings)?;

        debug!("connecting to {} ({}:{})", name, config.host, config.port);
        let transport = SshTransport::connect(config).await?;

        Ok(Session::new(transport, self.options.clone()))
    }
}
