use async_trait::async_trait;
use hostlink_runtime::{ConfigurationError, Handshake, RegistrationError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handshake for hosts that need no registration or configuration exchange.
///
/// Any byte-level protocol plugs in here by implementing [`Handshake`] instead.
pub struct PassthroughHandshake {
    link: String,
}

impl PassthroughHandshake {
    pub fn new(link: impl Into<String>) -> Self {
        Self { link: link.into() }
    }
}

#[async_trait]
impl Handshake for PassthroughHandshake {
    async fn register(&self, cancel: CancellationToken) -> Result<(), RegistrationError> {
        if cancel.is_cancelled() {
            return Err(RegistrationError::other("registration cancelled"));
        }
        debug!(link = %self.link, "Registration accepted");
        Ok(())
    }

    async fn configure(&self, cancel: CancellationToken) -> Result<(), ConfigurationError> {
        if cancel.is_cancelled() {
            return Err(ConfigurationError::other("configuration cancelled"));
        }
        debug!(link = %self.link, "Configuration accepted");
        Ok(())
    }
}
