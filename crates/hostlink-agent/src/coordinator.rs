use hostlink_runtime::{DisableCoordinator, DisableKey, DisablePriority, DisableRequest};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// One disable currently asserted against the machine
#[derive(Debug, Clone, Serialize)]
pub struct ActiveDisable {
    pub key: String,
    pub message: String,
    pub critical: bool,
    pub immediate: bool,
    pub help: Option<String>,
}

impl From<&DisableRequest> for ActiveDisable {
    fn from(request: &DisableRequest) -> Self {
        Self {
            key: request.key.to_string(),
            message: request.message.clone(),
            critical: request.critical,
            immediate: request.priority == DisablePriority::Immediate,
            help: request.help.clone(),
        }
    }
}

/// Stand-alone disable gate for the agent: keeps the active set and logs changes.
#[derive(Default)]
pub struct LoggingDisableCoordinator {
    active: Mutex<BTreeMap<DisableKey, DisableRequest>>,
}

impl LoggingDisableCoordinator {
    pub fn snapshot(&self) -> Vec<ActiveDisable> {
        self.active.lock().values().map(ActiveDisable::from).collect()
    }

    /// Active disables whose key belongs to `link`
    pub fn for_link(&self, link: &str) -> Vec<ActiveDisable> {
        let prefix = format!("{}.", link);
        self.active
            .lock()
            .values()
            .filter(|request| request.key.as_str().starts_with(&prefix))
            .map(ActiveDisable::from)
            .collect()
    }

    pub fn is_disabled(&self) -> bool {
        !self.active.lock().is_empty()
    }
}

impl DisableCoordinator for LoggingDisableCoordinator {
    fn disable(&self, request: DisableRequest) {
        let mut active = self.active.lock();
        if active.contains_key(&request.key) {
            return;
        }

        if request.critical {
            error!(key = %request.key, message = %request.message, "Machine disabled");
        } else {
            warn!(key = %request.key, message = %request.message, "Machine disabled");
        }
        active.insert(request.key.clone(), request);
    }

    fn enable(&self, key: &DisableKey) {
        let mut active = self.active.lock();
        if active.remove(key).is_some() {
            info!(%key, remaining = active.len(), "Disable cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_runtime::DisableReason;

    #[test]
    fn test_disable_is_idempotent() {
        let coordinator = LoggingDisableCoordinator::default();
        let request = DisableRequest::for_reason("bingo", DisableReason::HostDisconnected);

        coordinator.disable(request.clone());
        coordinator.disable(request);

        assert_eq!(coordinator.snapshot().len(), 1);
        assert!(coordinator.is_disabled());
    }

    #[test]
    fn test_enable_unknown_key_is_noop() {
        let coordinator = LoggingDisableCoordinator::default();
        coordinator.enable(&DisableKey::new("bingo", DisableReason::RegistrationFailed));
        assert!(!coordinator.is_disabled());
    }

    #[test]
    fn test_for_link_filters_by_prefix() {
        let coordinator = LoggingDisableCoordinator::default();
        coordinator.disable(DisableRequest::for_reason(
            "bingo",
            DisableReason::ConfigurationMismatch,
        ));
        coordinator.disable(DisableRequest::for_reason(
            "bingo-backup",
            DisableReason::HostDisconnected,
        ));

        let bingo = coordinator.for_link("bingo");
        assert_eq!(bingo.len(), 1);
        assert_eq!(bingo[0].key, "bingo.configuration-mismatch");
        assert!(bingo[0].critical);
        assert!(bingo[0].immediate);
    }
}
