use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle position of a host link.
///
/// Every state except `Idle` lives under the `Running` super-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    Disconnected,
    Connecting,
    Registering,
    InvalidRegistration,
    Configuring,
    InvalidConfiguration,
    ConfigurationMismatch,
    Connected,
}

impl State {
    pub const ALL: [State; 9] = [
        State::Idle,
        State::Disconnected,
        State::Connecting,
        State::Registering,
        State::InvalidRegistration,
        State::Configuring,
        State::InvalidConfiguration,
        State::ConfigurationMismatch,
        State::Connected,
    ];

    /// True for every substate of `Running`.
    pub fn is_running(&self) -> bool {
        !matches!(self, State::Idle)
    }

    /// Terminal failure states wait for `Disconnected` or `Reconfigure`.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            State::InvalidRegistration
                | State::InvalidConfiguration
                | State::ConfigurationMismatch
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Disconnected => "disconnected",
            State::Connecting => "connecting",
            State::Registering => "registering",
            State::InvalidRegistration => "invalid_registration",
            State::Configuring => "configuring",
            State::InvalidConfiguration => "invalid_configuration",
            State::ConfigurationMismatch => "configuration_mismatch",
            State::Connected => "connected",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Registration failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationFailureReason {
    Rejected,
    InvalidToken,
    Other,
}

impl RegistrationFailureReason {
    /// Credential is unusable until an operator changes it.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected | Self::InvalidToken)
    }
}

// Configuration failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurationFailureReason {
    Rejected,
    InvalidGameConfiguration,
    ConfigurationMismatch,
    Other,
}

/// Stimulus fed into the host link state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initialized,
    Shutdown,
    Connecting,
    Connected,
    Disconnected,
    Registered,
    RegistrationFailed(RegistrationFailureReason),
    Reconfigure,
    Configured,
    ConfiguringFailed(ConfigurationFailureReason),
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Initialized => "initialized",
            Trigger::Shutdown => "shutdown",
            Trigger::Connecting => "connecting",
            Trigger::Connected => "connected",
            Trigger::Disconnected => "disconnected",
            Trigger::Registered => "registered",
            Trigger::RegistrationFailed(_) => "registration_failed",
            Trigger::Reconfigure => "reconfigure",
            Trigger::Configured => "configured",
            Trigger::ConfiguringFailed(_) => "configuring_failed",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::RegistrationFailed(reason) => write!(f, "registration_failed({:?})", reason),
            Trigger::ConfiguringFailed(reason) => write!(f, "configuring_failed({:?})", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Reason a host link holds the machine disabled.
///
/// Each reason maps to one stable disable key per link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisableReason {
    HostDisconnected,
    RegistrationFailed,
    ConfigurationInvalid,
    ConfigurationMismatch,
}

impl DisableReason {
    pub const ALL: [DisableReason; 4] = [
        DisableReason::HostDisconnected,
        DisableReason::RegistrationFailed,
        DisableReason::ConfigurationInvalid,
        DisableReason::ConfigurationMismatch,
    ];

    /// Suffix used to build the per-link disable key
    pub fn slug(&self) -> &'static str {
        match self {
            DisableReason::HostDisconnected => "host-disconnected",
            DisableReason::RegistrationFailed => "registration-failed",
            DisableReason::ConfigurationInvalid => "configuration-invalid",
            DisableReason::ConfigurationMismatch => "configuration-mismatch",
        }
    }

    /// Operator-facing text
    pub fn message(&self) -> &'static str {
        match self {
            DisableReason::HostDisconnected => "Host disconnected",
            DisableReason::RegistrationFailed => "Host registration failed",
            DisableReason::ConfigurationInvalid => "Host rejected game configuration",
            DisableReason::ConfigurationMismatch => {
                "Configuration does not match host records, NVRAM clear required"
            }
        }
    }

    pub fn help(&self) -> Option<&'static str> {
        match self {
            DisableReason::HostDisconnected => None,
            DisableReason::RegistrationFailed => {
                Some("Verify the serial number and host registration settings")
            }
            DisableReason::ConfigurationInvalid => {
                Some("Verify the game configuration matches the host")
            }
            DisableReason::ConfigurationMismatch => {
                Some("Clear non-volatile memory and reconfigure the machine")
            }
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, DisableReason::ConfigurationMismatch)
    }
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
