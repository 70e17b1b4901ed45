use async_trait::async_trait;

use crate::domain::models::FleetView;
use crate::domain::ports::errors::FleetError;

/// Port resolving a stack's roles to reachable hosts
#[async_trait]
pub trait FleetResolver: Send + Sync {
    async fn resolve(&self, stack: &str, region: &str, account: &str)
        -> Result<FleetView, FleetError>;
}
