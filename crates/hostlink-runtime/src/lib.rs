//! Host connection supervision.
//!
//! [`HostLink`] owns one connection to a remote host: it connects, registers,
//! configures, watches for silence, and keeps the machine-wide disable gate in
//! step with whatever went wrong.

mod handle;
mod link_actor;
mod supervisor;

pub mod scope;
pub mod tcp_client;
pub mod watchdog;

pub use handle::{
    ExternalEvent, HostLink, LinkEvent, LinkSettings, DEFAULT_NO_MESSAGE_TIMEOUT,
    DEFAULT_RETRY_DELAY,
};
pub use tcp_client::TcpHostClient;

pub use hostlink_core::{
    ClientEvent, ConfigurationError, DisableCoordinator, DisableKey, DisablePriority,
    DisableRequest, Handshake, HostClient, HostLinkError, NetworkAllowance, NoopAllowance,
    RegistrationError,
};
pub use hostlink_shared::{
    ConfigurationFailureReason, DisableReason, RegistrationFailureReason, State, Trigger,
};
