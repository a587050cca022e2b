use crate::link_actor::LinkInput;
use futures::FutureExt;
use hostlink_core::{Handshake, HostClient, NetworkAllowance};
use hostlink_metrics::{CONNECT_ATTEMPTS_TOTAL, CONNECT_FAILURES_TOTAL};
use hostlink_shared::{ConfigurationFailureReason, RegistrationFailureReason, Trigger};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Spawn a background future whose panic is logged and then handed to `on_fault`.
pub(crate) fn spawn_supervised<F, R>(
    link: Arc<str>,
    task: &'static str,
    fut: F,
    on_fault: R,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
    R: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            error!(
                link = %link,
                task,
                panic = %panic_message(&*panic),
                "Background task faulted"
            );
            on_fault.await;
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reconnect loop of one attempt scope
pub(crate) struct ConnectLoop<C: HostClient> {
    pub link: Arc<str>,
    pub client: Arc<C>,
    pub allowance: Arc<dyn NetworkAllowance>,
    pub retry_delay: Duration,
    pub generation: u64,
    pub token: CancellationToken,
    pub tx: mpsc::WeakUnboundedSender<LinkInput>,
}

impl<C: HostClient> ConnectLoop<C> {
    /// Retry `connect` until it succeeds or the scope is cancelled.
    ///
    /// Never fires a trigger: leaving `Connecting` is driven by the transport
    /// callback or by whoever cancelled the scope.
    pub async fn run(self) {
        let address = self.client.address().to_string();
        let port = self.client.port();

        if let Err(e) = self.allowance.allow_outbound(&address, port).await {
            warn!(link = %self.link, %address, port, error = %e, "Failed to open network allowance");
        }

        let mut attempt: u64 = 0;
        loop {
            if self.token.is_cancelled() {
                debug!(link = %self.link, generation = self.generation, "Connect loop cancelled");
                return;
            }

            attempt += 1;
            CONNECT_ATTEMPTS_TOTAL.with_label_values(&[self.link.as_ref()]).inc();

            let result = tokio::select! {
                _ = self.token.cancelled() => return,
                result = self.client.connect() => result,
            };

            match result {
                Ok(()) => {
                    info!(
                        link = %self.link,
                        %address,
                        port,
                        attempt,
                        "Connected to host"
                    );
                    if let Some(tx) = self.tx.upgrade() {
                        let _ = tx.send(LinkInput::ConnectSucceeded {
                            generation: self.generation,
                        });
                    }
                    return;
                }
                Err(e) => {
                    CONNECT_FAILURES_TOTAL.with_label_values(&[self.link.as_ref()]).inc();
                    warn!(
                        link = %self.link,
                        %address,
                        port,
                        attempt,
                        error = %e,
                        "Failed to connect. Retrying in {:?}...",
                        self.retry_delay
                    );
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}

/// Ready gate plus registration, mapped to the trigger it produces
pub(crate) async fn register<H: Handshake>(
    link: &str,
    handshake: &H,
    token: CancellationToken,
) -> Trigger {
    let result = async {
        handshake.await_ready(token.clone()).await?;
        handshake.register(token.clone()).await
    }
    .await;

    match result {
        Ok(()) => Trigger::Registered,
        Err(e) => {
            warn!(link, reason = ?e.reason, error = %e, "Registration failed");
            Trigger::RegistrationFailed(e.reason)
        }
    }
}

pub(crate) async fn configure<H: Handshake>(
    link: &str,
    handshake: &H,
    token: CancellationToken,
) -> Trigger {
    match handshake.configure(token).await {
        Ok(()) => Trigger::Configured,
        Err(e) => {
            warn!(link, reason = ?e.reason, error = %e, "Configuration failed");
            Trigger::ConfiguringFailed(e.reason)
        }
    }
}

/// Trigger that leaves a handshake state safely when its task faults
pub(crate) fn fault_trigger(op: HandshakeOp) -> Trigger {
    match op {
        HandshakeOp::Register => Trigger::RegistrationFailed(RegistrationFailureReason::Other),
        HandshakeOp::Configure => Trigger::ConfiguringFailed(ConfigurationFailureReason::Other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeOp {
    Register,
    Configure,
}

impl HandshakeOp {
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeOp::Register => "register",
            HandshakeOp::Configure => "configure",
        }
    }
}
