use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Transport callbacks surfaced by a host client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    MessageReceived,
}

/// Abstract connection to a remote host.
/// Allows switching between TCP and protocol-specific clients (or mocks) transparently.
#[async_trait]
pub trait HostClient: Send + Sync + 'static {
    /// Host name or IP the client connects to
    fn address(&self) -> &str;

    /// Remote port
    fn port(&self) -> u16;

    /// Subscribe to transport callbacks.
    ///
    /// Each call yields an independent receiver; dropping it unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;

    /// Perform one connection attempt.
    ///
    /// A successful attempt is followed by `ClientEvent::Connected` on the
    /// event stream.
    async fn connect(&self) -> Result<()>;

    /// Drop the current connection, if any.
    async fn disconnect(&self);
}
