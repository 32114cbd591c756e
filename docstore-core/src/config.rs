//! Client configuration.
//!
//! A [`ClientConfig`] names the target store (host, port, database) and carries the
//! transport tuning knobs. Credentials are never part of the serialized form: they are
//! supplied out-of-band, normally from the process environment.

use serde::{Deserialize, Serialize};
use std::{env, fmt, time::Duration};

/// Environment variable holding the store user name.
pub const USER_ENV: &str = "MONGO_USER";
/// Environment variable holding the store password.
pub const PASSWORD_ENV: &str = "MONGO_PASS";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "test";

/// User name and password for authenticating against the store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `MONGO_USER` / `MONGO_PASS`. Returns `None` unless both are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let username = env::var(USER_ENV).ok().filter(|v| !v.is_empty())?;
        let password = env::var(PASSWORD_ENV).ok().filter(|v| !v.is_empty())?;

        Some(Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings for a [`StoreConnector`](crate::backend::StoreConnector).
///
/// # Example
///
/// ```ignore
/// let config = ClientConfig::new("localhost", 27017, "restaurants")
///     .with_app_name("fixtures")
///     .with_env_credentials();
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Store host name (default: `localhost`).
    pub host: String,
    /// Store port (default: `27017`).
    pub port: u16,
    /// Database every collection operation is bound to (default: `test`).
    pub database: String,
    /// Full connection string; when set it replaces `host`/`port` (e.g. `mongodb+srv://` clusters).
    pub uri: Option<String>,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    /// Transport connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// How long to wait for a usable server before failing, in milliseconds.
    pub server_selection_timeout_ms: Option<u64>,
    #[serde(skip)]
    credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            uri: None,
            app_name: None,
            connect_timeout_ms: None,
            server_selection_timeout_ms: None,
            credentials: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            ..Self::default()
        }
    }

    /// Uses a full connection string instead of host and port.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Picks up credentials from the environment, keeping any already set when the variables are absent.
    pub fn with_env_credentials(mut self) -> Self {
        if let Some(credentials) = Credentials::from_env() {
            self.credentials = Some(credentials);
        }
        self
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_ms.map(Duration::from_millis)
    }

    /// `host:port`, or the connection string when one is configured. Never includes credentials.
    pub fn address(&self) -> String {
        match &self.uri {
            Some(uri) => redact_uri(uri),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address())
            .field("database", &self.database)
            .field("app_name", &self.app_name)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("server_selection_timeout_ms", &self.server_selection_timeout_ms)
            .field("credentials", &self.credentials)
            .finish()
    }
}

// Strips `user:pass@` from a connection string.
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}<redacted>{}", &uri[..scheme_end + 3], &uri[at..])
        }
        _ => uri.to_string(),
    }
}
