use hostlink_shared::DisableReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for one reason a link holds the machine disabled.
///
/// Keys are namespaced by link so that several links can share one coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisableKey(String);

impl DisableKey {
    pub fn new(link: &str, reason: DisableReason) -> Self {
        Self(format!("{}.{}", link, reason.slug()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisablePriority {
    /// Disable once the current game round completes
    Normal,
    /// Disable immediately
    Immediate,
}

/// Everything a coordinator needs to assert one disable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableRequest {
    pub key: DisableKey,
    pub priority: DisablePriority,
    pub message: String,
    pub critical: bool,
    pub help: Option<String>,
}

impl DisableRequest {
    pub fn for_reason(link: &str, reason: DisableReason) -> Self {
        let priority = if reason.is_critical() {
            DisablePriority::Immediate
        } else {
            DisablePriority::Normal
        };

        Self {
            key: DisableKey::new(link, reason),
            priority,
            message: format!("{}: {}", link, reason.message()),
            critical: reason.is_critical(),
            help: reason.help().map(str::to_string),
        }
    }
}

/// Machine-wide keyed enable/disable gate.
///
/// Both calls must be idempotent: enabling a key that is not disabled is a no-op.
#[cfg_attr(test, mockall::automock)]
pub trait DisableCoordinator: Send + Sync + 'static {
    fn disable(&self, request: DisableRequest);

    fn enable(&self, key: &DisableKey);
}
