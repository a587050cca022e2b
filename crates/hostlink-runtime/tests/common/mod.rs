#![allow(dead_code)]

use async_trait::async_trait;
use hostlink_runtime::{
    ClientEvent, ConfigurationError, DisableCoordinator, DisableKey, DisableRequest, Handshake,
    HostClient, HostLink, HostLinkError, LinkSettings, NoopAllowance, RegistrationError, State,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub const LINK: &str = "bingo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Scripted transport
pub struct FakeClient {
    events: broadcast::Sender<ClientEvent>,
    script: Mutex<VecDeque<ConnectBehavior>>,
    default: Mutex<ConnectBehavior>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: AtomicUsize,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeClient {
    pub fn new(default: ConnectBehavior) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, behaviors: &[ConnectBehavior]) {
        self.script.lock().extend(behaviors.iter().copied());
    }

    pub fn set_default(&self, behavior: ConnectBehavior) {
        *self.default.lock() = behavior;
    }

    pub fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostClient for FakeClient {
    fn address(&self) -> &str {
        "10.0.0.10"
    }

    fn port(&self) -> u16 {
        7500
    }

    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn connect(&self) -> Result<(), HostLinkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(*self.default.lock());

        match behavior {
            ConnectBehavior::Succeed => {
                self.emit(ClientEvent::Connected);
                Ok(())
            }
            ConnectBehavior::Fail => Err(connect_error()),
            ConnectBehavior::Hang => {
                hang().await;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum Step<E> {
    Reply(Result<(), E>),
    Hang,
    Panic,
}

/// Scripted registration/configuration exchange; unscripted calls succeed
#[derive(Default)]
pub struct FakeHandshake {
    register_script: Mutex<VecDeque<Step<RegistrationError>>>,
    configure_script: Mutex<VecDeque<Step<ConfigurationError>>>,
    pub registers: AtomicUsize,
    pub configures: AtomicUsize,
}

impl FakeHandshake {
    pub fn on_register(&self, step: Step<RegistrationError>) {
        self.register_script.lock().push_back(step);
    }

    pub fn on_configure(&self, step: Step<ConfigurationError>) {
        self.configure_script.lock().push_back(step);
    }

    pub fn registers(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }
}

async fn play<E>(step: Option<Step<E>>, cancel: CancellationToken, cancelled: E) -> Result<(), E> {
    match step {
        None => Ok(()),
        Some(Step::Reply(result)) => result,
        Some(Step::Hang) => {
            cancel.cancelled().await;
            Err(cancelled)
        }
        Some(Step::Panic) => panic!("handshake exploded"),
    }
}

#[async_trait]
impl Handshake for FakeHandshake {
    async fn register(&self, cancel: CancellationToken) -> Result<(), RegistrationError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        let step = self.register_script.lock().pop_front();
        play(step, cancel, RegistrationError::other("cancelled")).await
    }

    async fn configure(&self, cancel: CancellationToken) -> Result<(), ConfigurationError> {
        self.configures.fetch_add(1, Ordering::SeqCst);
        let step = self.configure_script.lock().pop_front();
        play(step, cancel, ConfigurationError::other("cancelled")).await
    }
}

/// Disable coordinator that remembers which keys are held
#[derive(Default)]
pub struct RecordingCoordinator {
    active: Mutex<BTreeSet<DisableKey>>,
    pub requests: Mutex<Vec<DisableRequest>>,
}

impl RecordingCoordinator {
    pub fn is_disabled(&self, slug: &str) -> bool {
        let key = format!("{}.{}", LINK, slug);
        self.active.lock().iter().any(|k| k.as_str() == key)
    }

    pub fn active(&self) -> Vec<String> {
        self.active.lock().iter().map(|k| k.to_string()).collect()
    }
}

impl DisableCoordinator for RecordingCoordinator {
    fn disable(&self, request: DisableRequest) {
        self.active.lock().insert(request.key.clone());
        self.requests.lock().push(request);
    }

    fn enable(&self, key: &DisableKey) {
        self.active.lock().remove(key);
    }
}

pub struct Harness {
    pub link: HostLink,
    pub client: Arc<FakeClient>,
    pub handshake: Arc<FakeHandshake>,
    pub coordinator: Arc<RecordingCoordinator>,
}

pub fn settings() -> LinkSettings {
    LinkSettings {
        no_message_timeout: Duration::from_secs(40),
        retry_delay: Duration::from_millis(500),
    }
}

pub fn harness(behavior: ConnectBehavior) -> Harness {
    hostlink_logging::init_test();

    let client = Arc::new(FakeClient::new(behavior));
    let handshake = Arc::new(FakeHandshake::default());
    let coordinator = Arc::new(RecordingCoordinator::default());
    let link = HostLink::spawn(
        LINK,
        settings(),
        client.clone(),
        handshake.clone(),
        coordinator.clone(),
        Arc::new(NoopAllowance),
    );

    Harness {
        link,
        client,
        handshake,
        coordinator,
    }
}

/// Wait (in virtual time) until the link reports `state`
pub async fn wait_for_state(link: &HostLink, state: State) {
    let mut rx = link.watch_state();
    let reached = tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            if *rx.borrow_and_update() == state {
                return;
            }
            if rx.changed().await.is_err() {
                panic!("host link stopped before reaching {}", state);
            }
        }
    })
    .await;

    assert!(reached.is_ok(), "{} not reached, still {}", state, link.state());
}

/// Poll until `check` holds, letting virtual time advance in small steps
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

pub fn connect_error() -> HostLinkError {
    HostLinkError::ConnectFailed {
        addr: "10.0.0.10:7500".to_string(),
        reason: "connection refused".to_string(),
    }
}

pub async fn hang() {
    future::pending::<()>().await
}
