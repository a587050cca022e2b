// Error types module
pub mod error;

// Collaborator contracts consumed by the host link
pub mod client;
pub mod handshake;
pub mod disable;
pub mod allowance;

// Re-export commonly used types
pub use error::{
    ConfigurationError, ErrorSeverity, HostLinkError, RegistrationError, Result,
};
pub use client::{ClientEvent, HostClient};
pub use handshake::Handshake;
pub use disable::{DisableCoordinator, DisableKey, DisablePriority, DisableRequest};
pub use allowance::{NetworkAllowance, NoopAllowance};
