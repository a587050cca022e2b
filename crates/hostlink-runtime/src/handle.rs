use crate::link_actor::{ActorParts, LinkActor, LinkInput};
use chrono::{DateTime, Utc};
use hostlink_core::{DisableCoordinator, Handshake, HostClient, HostLinkError, NetworkAllowance, Result};
use hostlink_shared::{State, Trigger};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default liveness timeout
pub const DEFAULT_NO_MESSAGE_TIMEOUT: Duration = Duration::from_secs(40);

/// Default pause between failed connection attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub no_message_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            no_message_timeout: DEFAULT_NO_MESSAGE_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Published on every move into or out of `Connected`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    ClientConnected { link: String, at: DateTime<Utc> },
    ClientDisconnected { link: String, at: DateTime<Utc> },
}

impl LinkEvent {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkEvent::ClientConnected { .. })
    }

    pub fn link(&self) -> &str {
        match self {
            LinkEvent::ClientConnected { link, .. } | LinkEvent::ClientDisconnected { link, .. } => {
                link
            }
        }
    }
}

/// Notifications from the rest of the machine that require a fresh handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalEvent {
    /// A property identifying this machine (serial number, host address...) changed
    IdentityChanged { property: String },
    /// An operator or host requested a reconnect
    ForcedReconnect,
}

/// Handle to a supervised host connection.
///
/// Cheap to clone; every clone talks to the same state machine.
#[derive(Clone)]
pub struct HostLink {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<LinkInput>,
    state_rx: watch::Receiver<State>,
    events_tx: broadcast::Sender<LinkEvent>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HostLink {
    /// Spawn the state machine task. The link stays `Idle` until `start`.
    pub fn spawn<C, H>(
        name: impl Into<String>,
        settings: LinkSettings,
        client: Arc<C>,
        handshake: Arc<H>,
        coordinator: Arc<dyn DisableCoordinator>,
        allowance: Arc<dyn NetworkAllowance>,
    ) -> Self
    where
        C: HostClient,
        H: Handshake,
    {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(State::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = LinkActor::new(ActorParts {
            name: name.clone(),
            settings,
            client,
            handshake,
            coordinator,
            allowance,
            receiver,
            loopback: tx.downgrade(),
            state_tx,
            events_tx: events_tx.clone(),
        });
        let task = tokio::spawn(actor.run());

        Self {
            name,
            tx,
            state_rx,
            events_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire `Initialized`; resolves once the link has left `Idle`.
    ///
    /// Connecting continues in the background.
    pub async fn start(&self) -> Result<State> {
        self.fire_and_wait(Trigger::Initialized).await
    }

    /// Fire `Shutdown`; resolves once the client is stopped and the link is `Idle`.
    pub async fn stop(&self) -> Result<State> {
        self.fire_and_wait(Trigger::Shutdown).await
    }

    /// Queue a trigger without waiting for it to be processed.
    pub fn fire(&self, trigger: Trigger) -> Result<()> {
        self.tx
            .send(LinkInput::Fire { trigger, ack: None })
            .map_err(|_| HostLinkError::ActorGone)
    }

    pub fn reconfigure(&self) -> Result<()> {
        self.fire(Trigger::Reconfigure)
    }

    pub async fn fire_and_wait(&self, trigger: Trigger) -> Result<State> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(LinkInput::Fire {
                trigger,
                ack: Some(ack),
            })
            .map_err(|_| HostLinkError::ActorGone)?;
        done.await.map_err(|_| HostLinkError::ActorGone)
    }

    pub fn state(&self) -> State {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.state_rx.clone()
    }

    /// Subscribe to `ClientConnected` / `ClientDisconnected`.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events_tx.subscribe()
    }

    /// Map identity changes and forced reconnects onto `Reconfigure`.
    ///
    /// The forwarding task ends when the source closes or the link is gone.
    pub fn attach_event_source(
        &self,
        mut source: broadcast::Receiver<ExternalEvent>,
    ) -> JoinHandle<()> {
        let link = self.clone();
        tokio::spawn(async move {
            loop {
                let event = match source.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        // Whatever was missed, one reconfigure covers it
                        warn!(link = %link.name, missed, "External event source lagged");
                        ExternalEvent::ForcedReconnect
                    }
                    Err(RecvError::Closed) => break,
                };

                info!(link = %link.name, ?event, "Reconfiguring host link");
                if link.reconfigure().is_err() {
                    break;
                }
            }
            debug!(link = %link.name, "External event source detached");
        })
    }

    /// Stop the link (if running) and wait for its task to finish.
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.tx.send(LinkInput::Close);

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|e| HostLinkError::InternalError(format!("host link task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HostLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLink")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
