use super::types::*;
use hostlink_shared::ConfigurationFailureReason;
use std::collections::BTreeSet;

/// Host link state machine.
///
/// Pure transition logic: feed it triggers, execute the returned actions.
/// Callers must serialize `step` calls.
pub struct HostLinkFsm {
    state: State,
    disabled: BTreeSet<DisableReason>,
}

impl Default for HostLinkFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLinkFsm {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            disabled: BTreeSet::new(),
        }
    }

    pub fn current_state(&self) -> State {
        self.state
    }

    /// Disable reasons currently asserted by this link
    pub fn active_disables(&self) -> impl Iterator<Item = DisableReason> + '_ {
        self.disabled.iter().copied()
    }

    pub fn is_disabled(&self, reason: DisableReason) -> bool {
        self.disabled.contains(&reason)
    }

    pub fn step(&mut self, trigger: Trigger) -> Vec<FsmAction> {
        let Some(next) = Self::resolve(self.state, trigger) else {
            return vec![FsmAction::Ignored {
                state: self.state,
                trigger,
            }];
        };

        let mut actions = Vec::new();
        let prev = self.state;

        self.on_exit(prev, trigger, &mut actions);
        self.state = next;
        self.on_entry(prev, next, &mut actions);

        actions
    }

    // Transition table. None = unhandled.
    fn resolve(state: State, trigger: Trigger) -> Option<State> {
        use State as S;
        use Trigger as T;

        let next = match (state, trigger) {
            (S::Idle, T::Initialized) => S::Disconnected,
            (S::Idle, _) => return None,

            // Running super-state
            (_, T::Shutdown) => S::Idle,

            (S::Disconnected, T::Connecting) => S::Connecting,

            (S::Connecting, T::Connecting | T::Reconfigure) => S::Connecting,
            (S::Connecting, T::Connected) => S::Registering,

            (S::Registering, T::Registered) => S::Configuring,
            (S::Registering, T::RegistrationFailed(reason)) => {
                if reason.is_permanent() {
                    S::InvalidRegistration
                } else {
                    S::Connecting
                }
            }

            (S::Configuring, T::Configured) => S::Connected,
            (S::Configuring, T::ConfiguringFailed(reason)) => match reason {
                ConfigurationFailureReason::Rejected
                | ConfigurationFailureReason::InvalidGameConfiguration => S::InvalidConfiguration,
                ConfigurationFailureReason::ConfigurationMismatch => S::ConfigurationMismatch,
                ConfigurationFailureReason::Other => S::Connecting,
            },

            (
                S::Registering
                | S::InvalidRegistration
                | S::Configuring
                | S::InvalidConfiguration
                | S::ConfigurationMismatch
                | S::Connected,
                T::Disconnected | T::Reconfigure,
            ) => S::Disconnected,

            _ => return None,
        };

        Some(next)
    }

    fn on_exit(&mut self, from: State, trigger: Trigger, actions: &mut Vec<FsmAction>) {
        match from {
            State::Registering if trigger == Trigger::Registered => {
                self.enable(DisableReason::RegistrationFailed, actions);
            }
            State::InvalidRegistration => {
                self.enable(DisableReason::RegistrationFailed, actions);
            }
            State::Configuring if trigger == Trigger::Configured => {
                self.enable(DisableReason::ConfigurationInvalid, actions);
                self.enable(DisableReason::ConfigurationMismatch, actions);
            }
            State::InvalidConfiguration => {
                self.enable(DisableReason::ConfigurationInvalid, actions);
            }
            State::ConfigurationMismatch => {
                self.enable(DisableReason::ConfigurationMismatch, actions);
            }
            State::Connected => {
                actions.push(FsmAction::DisarmWatchdog);
                actions.push(FsmAction::PublishDisconnected);
            }
            _ => {}
        }
    }

    fn on_entry(&mut self, from: State, to: State, actions: &mut Vec<FsmAction>) {
        match to {
            State::Idle => {
                actions.push(FsmAction::CancelAttempt);
                actions.push(FsmAction::DisarmWatchdog);
                actions.push(FsmAction::StopClient);
                actions.push(FsmAction::DetachClient);
                let held: Vec<_> = self.disabled.iter().copied().collect();
                for reason in held {
                    self.enable(reason, actions);
                }
            }
            State::Disconnected => {
                if from == State::Idle {
                    actions.push(FsmAction::AttachClient);
                }
                actions.push(FsmAction::DisarmWatchdog);
                self.disable(DisableReason::HostDisconnected, actions);
                actions.push(FsmAction::FollowUp(Trigger::Connecting));
            }
            State::Connecting => {
                // A retry from the handshake must not inherit the old deadline
                actions.push(FsmAction::DisarmWatchdog);
                actions.push(FsmAction::StartConnectLoop);
            }
            State::Registering => {
                actions.push(FsmAction::BeginRegistration);
            }
            State::InvalidRegistration => {
                actions.push(FsmAction::DisarmWatchdog);
                self.disable(DisableReason::RegistrationFailed, actions);
            }
            State::Configuring => {
                actions.push(FsmAction::BeginConfiguration);
            }
            State::InvalidConfiguration => {
                actions.push(FsmAction::DisarmWatchdog);
                self.disable(DisableReason::ConfigurationInvalid, actions);
            }
            State::ConfigurationMismatch => {
                actions.push(FsmAction::DisarmWatchdog);
                self.disable(DisableReason::ConfigurationMismatch, actions);
            }
            State::Connected => {
                self.enable(DisableReason::HostDisconnected, actions);
                actions.push(FsmAction::ArmWatchdog);
                actions.push(FsmAction::PublishConnected);
            }
        }
    }

    // Enable is always emitted, even for keys that were never disabled
    fn enable(&mut self, reason: DisableReason, actions: &mut Vec<FsmAction>) {
        self.disabled.remove(&reason);
        actions.push(FsmAction::Enable(reason));
    }

    fn disable(&mut self, reason: DisableReason, actions: &mut Vec<FsmAction>) {
        self.disabled.insert(reason);
        actions.push(FsmAction::Disable(reason));
    }
}
