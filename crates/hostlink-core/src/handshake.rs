use crate::error::{ConfigurationError, RegistrationError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Registration and configuration exchange with the host.
///
/// Both operations are idempotent; the host link calls them again on every
/// new connection. Implementations should return promptly once `cancel`
/// fires, since the result of a cancelled attempt is discarded anyway.
#[async_trait]
pub trait Handshake: Send + Sync + 'static {
    /// Wait until the local side is ready to register.
    ///
    /// Roles that must finish local configuration before registering
    /// override this. Errors are classified like registration errors.
    async fn await_ready(&self, _cancel: CancellationToken) -> Result<(), RegistrationError> {
        Ok(())
    }

    async fn register(&self, cancel: CancellationToken) -> Result<(), RegistrationError>;

    async fn configure(&self, cancel: CancellationToken) -> Result<(), ConfigurationError>;
}
