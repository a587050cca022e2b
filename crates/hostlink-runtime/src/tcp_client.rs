use async_trait::async_trait;
use hostlink_core::{ClientEvent, HostClient, HostLinkError, Result};
use parking_lot::Mutex;
use socket2::SockRef;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const EVENT_CAPACITY: usize = 256;

/// TCP client for host connections.
///
/// Every successful read counts as host traffic; framing is left to the protocol layer.
pub struct TcpHostClient {
    address: String,
    port: u16,
    connect_timeout: Duration,
    events: broadcast::Sender<ClientEvent>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TcpHostClient {
    /// Create new TCP client
    pub fn new(address: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            address: address.into(),
            port,
            connect_timeout,
            events,
            reader: Mutex::new(None),
        }
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    fn abort_reader(&self) -> bool {
        match self.reader.lock().take() {
            Some(reader) => {
                reader.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl HostClient for TcpHostClient {
    fn address(&self) -> &str {
        &self.address
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn connect(&self) -> Result<()> {
        let peer = self.peer();

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&peer)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(HostLinkError::ConnectFailed {
                    addr: peer,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(HostLinkError::ConnectTimeout {
                    addr: peer,
                    timeout_ms: self.connect_timeout.as_millis() as u64,
                })
            }
        };

        if let Err(e) = SockRef::from(&stream).set_keepalive(true) {
            warn!(%peer, error = %e, "Failed to enable TCP keepalive");
        }

        // A second connect replaces the previous session
        self.abort_reader();

        info!(%peer, "TCP session established");
        let _ = self.events.send(ClientEvent::Connected);

        let reader = tokio::spawn(read_loop(stream, self.events.clone(), peer));
        *self.reader.lock() = Some(reader);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.abort_reader() {
            info!(peer = %self.peer(), "TCP session closed");
        }
    }
}

impl Drop for TcpHostClient {
    fn drop(&mut self) {
        self.abort_reader();
    }
}

async fn read_loop(mut stream: TcpStream, events: broadcast::Sender<ClientEvent>, peer: String) {
    let mut buffer = [0u8; 4096];

    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => {
                debug!(%peer, "Connection closed by host");
                break;
            }
            Ok(n) => {
                trace!(%peer, bytes = n, "Received data");
                let _ = events.send(ClientEvent::MessageReceived);
            }
            Err(e) => {
                warn!(%peer, error = %e, "Connection lost");
                break;
            }
        }
    }

    let _ = events.send(ClientEvent::Disconnected);
}
