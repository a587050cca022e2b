use crate::handle::{LinkEvent, LinkSettings};
use crate::scope::ScopeSlot;
use crate::supervisor::{self, spawn_supervised, ConnectLoop, HandshakeOp};
use crate::watchdog::Watchdog;
use chrono::Utc;
use hostlink_core::{
    ClientEvent, DisableCoordinator, DisableKey, DisableRequest, Handshake, HostClient,
    NetworkAllowance,
};
use hostlink_fsm_core::{FsmAction, HostLinkFsm};
use hostlink_metrics::{
    CONNECTED_LINKS, IGNORED_TRIGGERS_TOTAL, TRANSITIONS_TOTAL, WATCHDOG_EXPIRIES_TOTAL,
};
use hostlink_shared::{State, Trigger};
use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

// Inputs to the actor
pub(crate) enum LinkInput {
    /// External trigger, optionally acknowledged once its transition completes
    Fire {
        trigger: Trigger,
        ack: Option<oneshot::Sender<State>>,
    },
    /// The connect loop of `generation` reached the host
    ConnectSucceeded { generation: u64 },
    /// The connect loop of `generation` panicked
    ConnectLoopFaulted { generation: u64 },
    /// A handshake operation finished
    OperationDone { op: u64, trigger: Trigger },
    /// Leave `Running` (if needed) and end the actor
    Close,
}

enum Wake {
    WatchdogExpired,
    Client(Result<ClientEvent, RecvError>),
    Input(Option<LinkInput>),
}

/// Drives one `HostLinkFsm` against its collaborators.
///
/// All triggers are funnelled through `receiver`, so transitions are strictly
/// ordered and never overlap.
pub(crate) struct LinkActor<C: HostClient, H: Handshake> {
    name: Arc<str>,
    core: HostLinkFsm,
    settings: LinkSettings,

    client: Arc<C>,
    handshake: Arc<H>,
    coordinator: Arc<dyn DisableCoordinator>,
    allowance: Arc<dyn NetworkAllowance>,

    // Runtime State
    receiver: mpsc::UnboundedReceiver<LinkInput>,
    loopback: mpsc::WeakUnboundedSender<LinkInput>,
    client_events: Option<broadcast::Receiver<ClientEvent>>,
    watchdog: Watchdog,
    scope: ScopeSlot,
    current_op: u64,
    follow_ups: VecDeque<Trigger>,

    state_tx: watch::Sender<State>,
    events_tx: broadcast::Sender<LinkEvent>,
}

pub(crate) struct ActorParts<C: HostClient, H: Handshake> {
    pub name: Arc<str>,
    pub settings: LinkSettings,
    pub client: Arc<C>,
    pub handshake: Arc<H>,
    pub coordinator: Arc<dyn DisableCoordinator>,
    pub allowance: Arc<dyn NetworkAllowance>,
    pub receiver: mpsc::UnboundedReceiver<LinkInput>,
    pub loopback: mpsc::WeakUnboundedSender<LinkInput>,
    pub state_tx: watch::Sender<State>,
    pub events_tx: broadcast::Sender<LinkEvent>,
}

impl<C: HostClient, H: Handshake> LinkActor<C, H> {
    pub fn new(parts: ActorParts<C, H>) -> Self {
        Self {
            watchdog: Watchdog::new(parts.settings.no_message_timeout),
            name: parts.name,
            core: HostLinkFsm::new(),
            settings: parts.settings,
            client: parts.client,
            handshake: parts.handshake,
            coordinator: parts.coordinator,
            allowance: parts.allowance,
            receiver: parts.receiver,
            loopback: parts.loopback,
            client_events: None,
            scope: ScopeSlot::new(),
            current_op: 0,
            follow_ups: VecDeque::new(),
            state_tx: parts.state_tx,
            events_tx: parts.events_tx,
        }
    }

    pub async fn run(mut self) {
        debug!(link = %self.name, "Host link actor started");

        loop {
            // Each branch borrows a distinct field; handling happens after select! returns
            let wake = tokio::select! {
                biased;
                _ = self.watchdog.expired() => Wake::WatchdogExpired,
                event = next_client_event(&mut self.client_events) => Wake::Client(event),
                input = self.receiver.recv() => Wake::Input(input),
            };

            match wake {
                Wake::WatchdogExpired => self.on_watchdog_expired().await,
                Wake::Client(event) => self.on_client_event(event).await,
                Wake::Input(Some(LinkInput::Close)) | Wake::Input(None) => break,
                Wake::Input(Some(input)) => self.on_input(input).await,
            }

            self.drain_follow_ups().await;
        }

        if self.core.current_state().is_running() {
            self.dispatch(Trigger::Shutdown).await;
        }
        debug!(link = %self.name, "Host link actor stopped");
    }

    async fn on_input(&mut self, input: LinkInput) {
        match input {
            LinkInput::Fire { trigger, ack } => {
                self.dispatch(trigger).await;
                if let Some(ack) = ack {
                    let _ = ack.send(self.core.current_state());
                }
            }
            LinkInput::ConnectSucceeded { generation } => {
                let state = self.core.current_state();
                let attempting = matches!(
                    state,
                    State::Connecting | State::Registering | State::Configuring
                );
                if self.scope.is_current(generation) && attempting {
                    self.watchdog.arm();
                } else {
                    debug!(link = %self.name, generation, %state, "Discarding stale connect result");
                }
            }
            LinkInput::ConnectLoopFaulted { generation } => {
                if self.scope.is_current(generation)
                    && self.core.current_state() == State::Connecting
                {
                    self.dispatch(Trigger::Connecting).await;
                }
            }
            LinkInput::OperationDone { op, trigger } => {
                if op == self.current_op {
                    self.dispatch(trigger).await;
                } else {
                    debug!(link = %self.name, op, %trigger, "Discarding superseded handshake result");
                }
            }
            LinkInput::Close => {}
        }
    }

    async fn on_client_event(&mut self, event: Result<ClientEvent, RecvError>) {
        match event {
            Ok(ClientEvent::Connected) => self.dispatch(Trigger::Connected).await,
            Ok(ClientEvent::Disconnected) => self.dispatch(Trigger::Disconnected).await,
            Ok(ClientEvent::MessageReceived) => {
                // Only post-connection silence counts
                if self.core.current_state() == State::Connected {
                    self.watchdog.arm();
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(link = %self.name, missed, "Client event subscription lagged");
            }
            Err(RecvError::Closed) => {
                warn!(link = %self.name, "Client event stream closed");
                self.client_events = None;
            }
        }
    }

    async fn on_watchdog_expired(&mut self) {
        self.watchdog.disarm();
        WATCHDOG_EXPIRIES_TOTAL
            .with_label_values(&[self.name.as_ref()])
            .inc();
        warn!(
            link = %self.name,
            state = %self.core.current_state(),
            timeout = ?self.watchdog.timeout(),
            "No messages from host within timeout"
        );
        self.dispatch(Trigger::Disconnected).await;
    }

    async fn drain_follow_ups(&mut self) {
        while let Some(trigger) = self.follow_ups.pop_front() {
            self.dispatch(trigger).await;
        }
    }

    // Step the core, then run its actions in order
    async fn dispatch(&mut self, trigger: Trigger) {
        let from = self.core.current_state();
        let actions = self.core.step(trigger);
        let to = self.core.current_state();

        let transitioned = !matches!(actions[..], [FsmAction::Ignored { .. }]);
        if transitioned {
            info!(link = %self.name, %from, %to, %trigger, "State transition");
            TRANSITIONS_TOTAL
                .with_label_values(&[self.name.as_ref(), to.as_str()])
                .inc();
        }

        for action in actions {
            self.execute(action).await;
        }

        if transitioned {
            self.state_tx.send_replace(to);
        }
    }

    async fn execute(&mut self, action: FsmAction) {
        match action {
            FsmAction::AttachClient => {
                self.client_events = Some(self.client.subscribe());
            }
            FsmAction::DetachClient => {
                self.client_events = None;
            }
            FsmAction::StartConnectLoop => self.start_connect_loop(),
            FsmAction::CancelAttempt => {
                self.scope.cancel();
                self.current_op += 1;
            }
            FsmAction::BeginRegistration => self.begin_handshake(HandshakeOp::Register),
            FsmAction::BeginConfiguration => self.begin_handshake(HandshakeOp::Configure),
            FsmAction::ArmWatchdog => self.watchdog.arm(),
            FsmAction::DisarmWatchdog => self.watchdog.disarm(),
            FsmAction::StopClient => self.client.disconnect().await,
            FsmAction::Disable(reason) => {
                let request = DisableRequest::for_reason(&self.name, reason);
                info!(link = %self.name, key = %request.key, critical = request.critical, "Disabling");
                self.coordinator.disable(request);
            }
            FsmAction::Enable(reason) => {
                let key = DisableKey::new(&self.name, reason);
                debug!(link = %self.name, %key, "Enabling");
                self.coordinator.enable(&key);
            }
            FsmAction::PublishConnected => {
                CONNECTED_LINKS.inc();
                let _ = self.events_tx.send(LinkEvent::ClientConnected {
                    link: self.name.to_string(),
                    at: Utc::now(),
                });
            }
            FsmAction::PublishDisconnected => {
                CONNECTED_LINKS.dec();
                let _ = self.events_tx.send(LinkEvent::ClientDisconnected {
                    link: self.name.to_string(),
                    at: Utc::now(),
                });
            }
            FsmAction::FollowUp(trigger) => self.follow_ups.push_back(trigger),
            FsmAction::Ignored { state, trigger } => {
                IGNORED_TRIGGERS_TOTAL
                    .with_label_values(&[self.name.as_ref()])
                    .inc();
                warn!(link = %self.name, %state, %trigger, "Ignoring trigger with no transition");
            }
        }
    }

    fn start_connect_loop(&mut self) {
        let scope = self.scope.renew();
        self.current_op += 1;

        let generation = scope.generation();
        debug!(link = %self.name, generation, "Starting connect loop");

        // Background tasks hold only the weak loopback
        let connect = ConnectLoop {
            link: self.name.clone(),
            client: self.client.clone(),
            allowance: self.allowance.clone(),
            retry_delay: self.settings.retry_delay,
            generation,
            token: scope.token().clone(),
            tx: self.loopback.clone(),
        };

        let loopback = self.loopback.clone();
        let retry_delay = self.settings.retry_delay;
        spawn_supervised(self.name.clone(), "connect", connect.run(), async move {
            tokio::time::sleep(retry_delay).await;
            if let Some(tx) = loopback.upgrade() {
                let _ = tx.send(LinkInput::ConnectLoopFaulted { generation });
            }
        });
    }

    fn begin_handshake(&mut self, op: HandshakeOp) {
        self.current_op += 1;
        let op_id = self.current_op;

        let token = self.scope.child_token();
        let handshake = self.handshake.clone();
        let link = self.name.clone();
        let loopback = self.loopback.clone();
        let fault_loopback = self.loopback.clone();

        let work = async move {
            let run = async {
                match op {
                    HandshakeOp::Register => {
                        supervisor::register(&link, handshake.as_ref(), token.clone()).await
                    }
                    HandshakeOp::Configure => {
                        supervisor::configure(&link, handshake.as_ref(), token.clone()).await
                    }
                }
            };

            let trigger = tokio::select! {
                _ = token.cancelled() => return,
                trigger = run => trigger,
            };
            if let Some(tx) = loopback.upgrade() {
                let _ = tx.send(LinkInput::OperationDone { op: op_id, trigger });
            }
        };

        spawn_supervised(self.name.clone(), op.name(), work, async move {
            if let Some(tx) = fault_loopback.upgrade() {
                let _ = tx.send(LinkInput::OperationDone {
                    op: op_id,
                    trigger: supervisor::fault_trigger(op),
                });
            }
        });
    }
}

async fn next_client_event(
    events: &mut Option<broadcast::Receiver<ClientEvent>>,
) -> Result<ClientEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
