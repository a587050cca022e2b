pub mod fsm;
pub mod types;

pub use fsm::HostLinkFsm;
pub use types::FsmAction;
