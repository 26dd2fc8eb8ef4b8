//! `OmokPeerBuilder`: configure a session and optionally start hosting.

use std::sync::Arc;
use std::time::Duration;

use omok_protocol::ParsePolicy;
use omok_session::{Controller, Session, SessionConfig};
use omok_transport::WireTap;

use crate::OmokError;

/// Builder for configuring a [`Session`].
///
/// # Example
///
/// ```rust,ignore
/// use omok::prelude::*;
///
/// let session = OmokPeerBuilder::new()
///     .port(8001)
///     .parse_policy(ParsePolicy::Strict)
///     .listen(true)
///     .build(my_controller)
///     .await?;
/// ```
pub struct OmokPeerBuilder {
    config: SessionConfig,
    tap: Option<Arc<dyn WireTap>>,
    listen: bool,
}

impl OmokPeerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            tap: None,
            listen: false,
        }
    }

    /// Sets the interface the host side binds to.
    pub fn bind_host(mut self, host: &str) -> Self {
        self.config.bind_host = host.to_string();
        self
    }

    /// Sets the port the host side binds to. 0 lets the OS choose.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets how long an outbound connect may take.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets how the decoder treats malformed message bodies.
    pub fn parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.config.parse_policy = policy;
        self
    }

    /// Sets whether `play:` is rejected automatically while busy.
    pub fn auto_reject_when_busy(mut self, enabled: bool) -> Self {
        self.config.auto_reject_when_busy = enabled;
        self
    }

    /// Replaces the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirrors every wire line to `tap`.
    pub fn tap(mut self, tap: Arc<dyn WireTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Starts hosting as part of [`build`](Self::build).
    pub fn listen(mut self, listen: bool) -> Self {
        self.listen = listen;
        self
    }

    /// Builds the session around `controller`, binding the host port
    /// first if [`listen`](Self::listen) was requested.
    pub async fn build<C: Controller>(
        self,
        controller: C,
    ) -> Result<Session<C>, OmokError> {
        let session = Session::with_config(controller, self.config);
        if let Some(tap) = self.tap {
            session.set_tap(tap);
        }
        if self.listen {
            session.listen().await?;
        }
        Ok(session)
    }
}

impl Default for OmokPeerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
