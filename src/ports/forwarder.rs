use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultForwarder: Send + Sync {
    /// Send a finished file to the result server, returning its HTTP status
    async fn forward(&self, path: &Path) -> Result<u16>;
}
