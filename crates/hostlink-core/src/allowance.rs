use crate::error::Result;
use async_trait::async_trait;

/// Opens an outbound network allowance (e.g. a firewall rule) for a host.
///
/// Called once per connection attempt scope; must be safe to repeat.
#[async_trait]
pub trait NetworkAllowance: Send + Sync + 'static {
    async fn allow_outbound(&self, address: &str, port: u16) -> Result<()>;
}

/// Allowance for environments without an outbound filter
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAllowance;

#[async_trait]
impl NetworkAllowance for NoopAllowance {
    async fn allow_outbound(&self, _address: &str, _port: u16) -> Result<()> {
        Ok(())
    }
}
