use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RedemptionResult;
use crate::models::{
    DelegationData, Network, Product, ProductToken, RedemptionFailure, RedemptionSuccess, Token,
    Wallet,
};

/// Store contract for the redemption pipeline
///
/// Lookups return `Ok(None)` for missing or soft-deleted rows; the pipeline
/// decides whether that is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionRepository: Send + Sync {
    async fn get_delegation(&self, id: Uuid) -> RedemptionResult<Option<DelegationData>>;

    async fn get_product(&self, id: Uuid) -> RedemptionResult<Option<Product>>;

    /// Wallet scoped to the workspace owning the product
    async fn get_wallet(&self, id: Uuid, workspace_id: Uuid) -> RedemptionResult<Option<Wallet>>;

    async fn get_product_token(&self, id: Uuid) -> RedemptionResult<Option<ProductToken>>;

    async fn get_token(&self, id: Uuid) -> RedemptionResult<Option<Token>>;

    async fn get_network(&self, id: Uuid) -> RedemptionResult<Option<Network>>;

    /// Persist a failed redemption event
    async fn record_failure(&self, failure: RedemptionFailure) -> RedemptionResult<()>;

    /// Persist a successful redemption event
    async fn record_success(&self, success: RedemptionSuccess) -> RedemptionResult<()>;

    /// Schedule the subscription's next redemption
    async fn update_next_redemption(
        &self,
        subscription_id: Uuid,
        next_redemption_at: DateTime<Utc>,
    ) -> RedemptionResult<()>;
}
