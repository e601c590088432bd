//! Named server descriptors.
//!
//! A [`ServerRegistry`] maps server names to [`ServerConfig`] entries. It can
//! be filled in code or loaded from a JSON document shaped like:
//!
//! ```json
//! {
//!   "servers": {
//!     "web1": {
//!       "host": "web1.example.com",
//!       "username": "deploy",
//!       "auth_type": "key",
//!       "public_key": "/home/deploy/.ssh/id_ed25519"
//!     }
//!   }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, Result};
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};

/// How a server's credential is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Log in with `password`.
    Password,
    /// Log in with the private key at `public_key`.
    Key,
}

/// Connection descriptor for one named server.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    pub auth_type: AuthType,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Key file loaded as key material when `auth_type` is `key`.
    #[serde(default)]
    pub public_key: Option<PathBuf>,

    /// Passphrase for an encrypted key file.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub passphrase: Option<SecretString>,

    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    /// Overrides the user's `~/.ssh/known_hosts`.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl ServerConfig {
    /// Create a descriptor using password authentication.
    pub fn with_password(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            auth_type: AuthType::Password,
            password: Some(SecretString::from(password.into())),
            public_key: None,
            passphrase: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }

    /// Create a descriptor using private key authentication.
    pub fn with_key(
        host: impl Into<String>,
        username: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            auth_type: AuthType::Key,
            password: None,
            public_key: Some(key_path.into()),
            passphrase: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }

    /// Set the SSH port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Build the authentication method selected by `auth_type`.
    fn auth_method(&self, server: &str) -> Result<AuthMethod> {
        match self.auth_type {
            AuthType::Password => {
                let password = self.password.clone().ok_or_else(|| {
                    ConfigError::MissingCredential {
                        server: server.to_string(),
                        field: "password",
                    }
                })?;
                Ok(AuthMethod::Password(password))
            }
            AuthType::Key => {
                let path = self.public_key.clone().ok_or_else(|| {
                    ConfigError::MissingCredential {
                        server: server.to_string(),
                        field: "public_key",
                    }
                })?;
                Ok(AuthMethod::PrivateKey {
                    path,
                    passphrase: self.passphrase.clone(),
                })
            }
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_type", &self.auth_type)
            .field("public_key", &self.public_key)
            .field("host_key_verification", &self.host_key_verification)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    servers: IndexMap<String, ServerConfig>,
}

/// Connection settings that come from the caller rather than the server entry.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    /// Budget for connecting, logging in and starting the shell.
    pub timeout: Duration,
    pub terminal_width: u32,
    pub terminal_height: u32,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        }
    }
}

/// Ordered collection of named server descriptors.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: IndexMap<String, ServerConfig>,
}

impl ServerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        Ok(Self {
            servers: file.servers,
        })
    }

    /// Load a registry from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Register (or replace) a server descriptor.
    pub fn insert(&mut self, name: impl Into<String>, server: ServerConfig) -> &mut Self {
        self.servers.insert(name.into(), server);
        self
    }

    /// Get a server descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.get(name)
    }

    /// Check if a server is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// List registered server names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    /// Resolve a server name into a transport configuration.
    ///
    /// Fails without side effects if the name is unknown or the entry lacks
    /// the credential its `auth_type` requires.
    pub fn resolve(&self, name: &str, settings: &ConnectSettings) -> Result<SshConfig> {
        let server = self.get(name).ok_or_else(|| ConfigError::UnknownServer {
            name: name.to_string(),
        })?;

        Ok(SshConfig {
            host: server.host.clone(),
            port: server.port,
            username: server.username.clone(),
            auth: server.auth_method(name)?,
            timeout: settings.timeout,
            terminal_width: settings.terminal_width,
            terminal_height: settings.terminal_height,
            host_key_verification: server.host_key_verification.clone(),
            known_hosts_path: server.known_hosts.clone(),
        })
    }
}
