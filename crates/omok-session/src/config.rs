//! Session configuration.

use std::time::Duration;

use omok_protocol::ParsePolicy;
use serde::{Deserialize, Serialize};

/// The port a host listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8001;

/// Configuration for a [`Session`](crate::Session).
///
/// Sensible defaults are provided; override just the fields you care
/// about with struct update syntax:
///
/// ```rust
/// use omok_session::SessionConfig;
///
/// let config = SessionConfig {
///     port: 0, // let the OS pick
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.bind_addr(), "0.0.0.0:0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interface the host accept loop binds to.
    pub bind_host: String,

    /// Port the host accept loop binds to. 0 lets the OS choose.
    pub port: u16,

    /// How long an outbound connect may take before it's abandoned.
    pub connect_timeout: Duration,

    /// How forgiving the decoder is with malformed message bodies.
    pub parse_policy: ParsePolicy,

    /// Answer `play:` with a rejection, without asking the controller,
    /// when this side isn't idle-and-connected (already in a game or
    /// waiting on its own request).
    pub auto_reject_when_busy: bool,
}

impl SessionConfig {
    /// The `host:port` string the accept loop binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            parse_policy: ParsePolicy::Permissive,
            auto_reject_when_busy: true,
        }
    }
}
