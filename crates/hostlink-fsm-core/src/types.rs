pub use hostlink_shared::{DisableReason, State, Trigger};

/// What the runtime must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmAction {
    AttachClient,               // subscribe to client callbacks
    DetachClient,               // drop the subscription
    StartConnectLoop,           // renew the attempt scope and spawn the connect loop
    CancelAttempt,              // cancel the current attempt scope
    BeginRegistration,          // spawn await_ready + register
    BeginConfiguration,         // spawn configure
    ArmWatchdog,                // (re)start the liveness timer
    DisarmWatchdog,             // stop the liveness timer
    StopClient,                 // HostClient::disconnect
    Disable(DisableReason),
    Enable(DisableReason),
    PublishConnected,           // LinkEvent::ClientConnected
    PublishDisconnected,        // LinkEvent::ClientDisconnected
    FollowUp(Trigger),          // fire another trigger once this one completes
    Ignored { state: State, trigger: Trigger },
}
