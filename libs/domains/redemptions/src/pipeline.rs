//! Per-task redemption pipeline.
//!
//! Resolves everything the delegation service needs from the store, calls
//! it once and persists the outcome. Only the health probe feeds the
//! circuit breaker; every failure after it is final for the task.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use task_worker::{TaskProcessor, WorkerError};
use tracing::{error, info, instrument, warn};

use crate::client::DelegationClient;
use crate::error::{RedemptionError, RedemptionResult};
use crate::models::{
    DelegationData, ExecutionPayload, RedemptionFailure, RedemptionSuccess, RedemptionTask,
};
use crate::repository::RedemptionRepository;

/// Format an amount in pennies as a decimal string without trailing zeros.
///
/// `1000 -> "10"`, `1050 -> "10.5"`, `1 -> "0.01"`.
pub fn format_price(price_in_pennies: i64) -> String {
    let sign = if price_in_pennies < 0 { "-" } else { "" };
    let pennies = price_in_pennies.unsigned_abs();
    let (whole, cents) = (pennies / 100, pennies % 100);

    match cents {
        0 => format!("{sign}{whole}"),
        c if c % 10 == 0 => format!("{sign}{whole}.{}", c / 10),
        c => format!("{sign}{whole}.{c:02}"),
    }
}

pub struct RedemptionPipeline<R, C> {
    repository: Arc<R>,
    client: Arc<C>,
    redemption_interval: TimeDelta,
}

impl<R, C> RedemptionPipeline<R, C>
where
    R: RedemptionRepository,
    C: DelegationClient,
{
    pub fn new(repository: Arc<R>, client: Arc<C>, redemption_interval: TimeDelta) -> Self {
        Self {
            repository,
            client,
            redemption_interval,
        }
    }

    /// Steps 2 to 6: resolve, redeem, persist, reschedule.
    #[instrument(
        name = "redemption",
        skip(self, task),
        fields(subscription_id = %task.subscription_id, delegation_id = %task.delegation_id)
    )]
    pub async fn redeem(&self, task: &RedemptionTask) -> RedemptionResult<String> {
        let (delegation, execution) = self.resolve(task).await.inspect_err(|e| {
            error!(error = %e, "Failed to resolve redemption data");
        })?;

        let transaction_hash = match self
            .client
            .redeem_delegation(delegation.into(), execution)
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                let error = match e {
                    RedemptionError::Redemption(_) => e,
                    other => RedemptionError::Redemption(other.to_string()),
                };
                error!(error = %error, "Delegation redemption failed");
                if let Err(record_error) = self
                    .repository
                    .record_failure(RedemptionFailure::for_task(task, error.to_string()))
                    .await
                {
                    error!(error = %record_error, "Failed to record redemption failure");
                }
                return Err(error);
            }
        };

        self.repository
            .record_success(RedemptionSuccess {
                subscription_id: task.subscription_id,
                transaction_hash: transaction_hash.clone(),
                amount_in_cents: task.amount_in_cents,
                metadata: task.metadata.clone(),
            })
            .await
            .inspect_err(|e| {
                error!(transaction_hash = %transaction_hash, error = %e, "Failed to record redemption success");
            })?;

        let next_redemption_at = Utc::now() + self.redemption_interval;
        self.repository
            .update_next_redemption(task.subscription_id, next_redemption_at)
            .await
            .inspect_err(|e| {
                error!(error = %e, "Failed to schedule next redemption");
            })?;

        info!(
            transaction_hash = %transaction_hash,
            next_redemption_at = %next_redemption_at,
            "Redemption completed"
        );
        Ok(transaction_hash)
    }

    async fn resolve(
        &self,
        task: &RedemptionTask,
    ) -> RedemptionResult<(DelegationData, ExecutionPayload)> {
        let delegation = self
            .repository
            .get_delegation(task.delegation_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("delegation", task.delegation_id))?;

        let product = self
            .repository
            .get_product(task.product_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("product", task.product_id))?;

        let wallet = self
            .repository
            .get_wallet(product.wallet_id, product.workspace_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("wallet", product.wallet_id))?;

        let product_token = self
            .repository
            .get_product_token(task.product_token_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("product token", task.product_token_id))?;

        if product_token.product_id != product.id {
            return Err(RedemptionError::InvalidData(format!(
                "product token {} does not belong to product {}",
                product_token.id, product.id
            )));
        }

        let token = self
            .repository
            .get_token(product_token.token_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("token", product_token.token_id))?;

        let network = self
            .repository
            .get_network(product_token.network_id)
            .await?
            .ok_or_else(|| RedemptionError::not_found("network", product_token.network_id))?;

        let execution = ExecutionPayload {
            merchant_address: wallet.wallet_address,
            token_contract_address: token.contract_address,
            price: format_price(product.price_in_pennies),
            chain_id: network.chain_id,
            network_name: network.name,
        };

        Ok((delegation, execution))
    }
}

#[async_trait]
impl<R, C> TaskProcessor<RedemptionTask> for RedemptionPipeline<R, C>
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    async fn process(&self, task: &RedemptionTask) -> Result<(), WorkerError> {
        self.redeem(task).await.map(|_| ()).map_err(WorkerError::from)
    }

    async fn health_check(&self) -> Result<(), WorkerError> {
        self.client
            .health_check()
            .await
            .map_err(|e| WorkerError::unavailable(e.to_string()))
    }

    async fn on_unavailable(
        &self,
        task: &RedemptionTask,
        error: &WorkerError,
    ) -> Result<(), WorkerError> {
        warn!(
            subscription_id = %task.subscription_id,
            delegation_id = %task.delegation_id,
            error = %error,
            "Recording redemption skipped by failed health check"
        );
        self.repository
            .record_failure(RedemptionFailure::for_task(task, error.to_string()))
            .await
            .map_err(WorkerError::from)
    }

    fn name(&self) -> &'static str {
        "RedemptionPipeline"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::MockDelegationClient;
    use crate::models::{Network, Product, ProductToken, Token, Wallet};
    use crate::repository::MockRedemptionRepository;
    use mockall::predicate::eq;
    use serde_json::json;
    use task_worker::ErrorCategory;
    use uuid::Uuid;

    /// A fully linked set of lookup rows for one task.
    #[derive(Clone)]
    pub(crate) struct Fixture {
        pub task: RedemptionTask,
        pub delegation: DelegationData,
        pub product: Product,
        pub wallet: Wallet,
        pub product_token: ProductToken,
        pub token: Token,
        pub network: Network,
    }

    impl Fixture {
        pub fn new() -> Self {
            let workspace_id = Uuid::now_v7();
            let network = Network {
                id: Uuid::now_v7(),
                name: "base".into(),
                chain_id: 8453,
            };
            let token = Token {
                id: Uuid::now_v7(),
                network_id: network.id,
                symbol: "USDC".into(),
                contract_address: "0xusdc".into(),
            };
            let wallet = Wallet {
                id: Uuid::now_v7(),
                workspace_id,
                wallet_address: "0xmerchant".into(),
            };
            let product = Product {
                id: Uuid::now_v7(),
                workspace_id,
                wallet_id: wallet.id,
                name: "Pro plan".into(),
                price_in_pennies: 1050,
            };
            let product_token = ProductToken {
                id: Uuid::now_v7(),
                product_id: product.id,
                network_id: network.id,
                token_id: token.id,
            };
            let delegation = DelegationData {
                id: Uuid::now_v7(),
                delegate: "0xdelegate".into(),
                delegator: "0xsubscriber".into(),
                authority: "0xroot".into(),
                caveats: vec![],
                salt: "1".into(),
                signature: "0xsig".into(),
            };
            let task = RedemptionTask {
                subscription_id: Uuid::now_v7(),
                delegation_id: delegation.id,
                product_id: product.id,
                product_token_id: product_token.id,
                amount_in_cents: 1050,
                metadata: json!({"source": "test"}),
            };

            Self {
                task,
                delegation,
                product,
                wallet,
                product_token,
                token,
                network,
            }
        }

        /// Mock repository answering every lookup for this fixture.
        pub fn repository(&self) -> MockRedemptionRepository {
            let mut repo = MockRedemptionRepository::new();

            let delegation = self.delegation.clone();
            repo.expect_get_delegation()
                .with(eq(delegation.id))
                .returning(move |_| Ok(Some(delegation.clone())));

            let product = self.product.clone();
            repo.expect_get_product()
                .with(eq(product.id))
                .returning(move |_| Ok(Some(product.clone())));

            let wallet = self.wallet.clone();
            repo.expect_get_wallet()
                .with(eq(wallet.id), eq(wallet.workspace_id))
                .returning(move |_, _| Ok(Some(wallet.clone())));

            let product_token = self.product_token.clone();
            repo.expect_get_product_token()
                .with(eq(product_token.id))
                .returning(move |_| Ok(Some(product_token.clone())));

            let token = self.token.clone();
            repo.expect_get_token()
                .with(eq(token.id))
                .returning(move |_| Ok(Some(token.clone())));

            let network = self.network.clone();
            repo.expect_get_network()
                .with(eq(network.id))
                .returning(move |_| Ok(Some(network.clone())));

            repo
        }
    }

    fn pipeline(
        repo: MockRedemptionRepository,
        client: MockDelegationClient,
    ) -> RedemptionPipeline<MockRedemptionRepository, MockDelegationClient> {
        RedemptionPipeline::new(Arc::new(repo), Arc::new(client), TimeDelta::days(30))
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1000), "10");
        assert_eq!(format_price(1050), "10.5");
        assert_eq!(format_price(1055), "10.55");
        assert_eq!(format_price(1), "0.01");
        assert_eq!(format_price(10), "0.1");
        assert_eq!(format_price(0), "0");
        assert_eq!(format_price(-250), "-2.5");
    }

    #[tokio::test]
    async fn test_successful_redemption() {
        let fixture = Fixture::new();
        let mut repo = fixture.repository();
        let subscription_id = fixture.task.subscription_id;

        repo.expect_record_success()
            .withf(move |s| {
                s.subscription_id == subscription_id
                    && s.transaction_hash == "0xhash"
                    && s.amount_in_cents == 1050
                    && s.metadata == json!({"source": "test"})
            })
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_update_next_redemption()
            .withf(move |id, at| {
                let expected = Utc::now() + TimeDelta::days(30);
                *id == subscription_id && (expected - *at).num_seconds().abs() < 60
            })
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_record_failure().never();

        let mut client = MockDelegationClient::new();
        client
            .expect_redeem_delegation()
            .withf(|delegation, execution| {
                delegation.delegator == "0xsubscriber"
                    && execution.merchant_address == "0xmerchant"
                    && execution.token_contract_address == "0xusdc"
                    && execution.price == "10.5"
                    && execution.chain_id == 8453
                    && execution.network_name == "base"
            })
            .times(1)
            .returning(|_, _| Ok("0xhash".to_string()));

        let hash = pipeline(repo, client).redeem(&fixture.task).await.unwrap();
        assert_eq!(hash, "0xhash");
    }

    #[tokio::test]
    async fn test_missing_product_writes_no_record() {
        let fixture = Fixture::new();
        let mut repo = MockRedemptionRepository::new();
        let delegation = fixture.delegation.clone();
        repo.expect_get_delegation()
            .returning(move |_| Ok(Some(delegation.clone())));
        repo.expect_get_product().returning(|_| Ok(None));
        repo.expect_record_failure().never();
        repo.expect_record_success().never();
        repo.expect_update_next_redemption().never();

        let mut client = MockDelegationClient::new();
        client.expect_redeem_delegation().never();

        let pipeline = pipeline(repo, client);
        let err = pipeline.process(&fixture.task).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Infrastructure);
        assert!(err.to_string().contains("product not found"));
    }

    #[tokio::test]
    async fn test_foreign_product_token_is_invalid() {
        let mut fixture = Fixture::new();
        fixture.product_token.product_id = Uuid::now_v7();
        let mut repo = fixture.repository();
        repo.expect_record_failure().never();

        let mut client = MockDelegationClient::new();
        client.expect_redeem_delegation().never();

        let err = pipeline(repo, client).redeem(&fixture.task).await.unwrap_err();
        assert!(matches!(err, RedemptionError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_rejected_redemption_records_one_failure() {
        let fixture = Fixture::new();
        let mut repo = fixture.repository();
        let subscription_id = fixture.task.subscription_id;

        repo.expect_record_failure()
            .withf(move |f| {
                f.subscription_id == subscription_id
                    && f.amount_in_cents == 1050
                    && f.error_message.contains("execution reverted")
            })
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_record_success().never();
        repo.expect_update_next_redemption().never();

        let mut client = MockDelegationClient::new();
        client
            .expect_redeem_delegation()
            .times(1)
            .returning(|_, _| Err(RedemptionError::Redemption("execution reverted".into())));

        let err = pipeline(repo, client).process(&fixture.task).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Business);
    }

    #[tokio::test]
    async fn test_unavailable_during_call_is_a_redemption_failure() {
        let fixture = Fixture::new();
        let mut repo = fixture.repository();
        repo.expect_record_failure().times(1).returning(|_| Ok(()));

        let mut client = MockDelegationClient::new();
        client
            .expect_redeem_delegation()
            .returning(|_, _| Err(RedemptionError::Unavailable("connection reset".into())));

        let err = pipeline(repo, client).redeem(&fixture.task).await.unwrap_err();
        assert!(matches!(err, RedemptionError::Redemption(ref m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_failed_success_write_is_infrastructure_error() {
        let fixture = Fixture::new();
        let mut repo = fixture.repository();
        repo.expect_record_success()
            .returning(|_| Err(RedemptionError::Database("connection closed".into())));
        repo.expect_update_next_redemption().never();
        repo.expect_record_failure().never();

        let mut client = MockDelegationClient::new();
        client
            .expect_redeem_delegation()
            .returning(|_, _| Ok("0xhash".to_string()));

        let err = pipeline(repo, client).process(&fixture.task).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
    }

    #[tokio::test]
    async fn test_any_probe_error_means_unavailable() {
        let mut client = MockDelegationClient::new();
        client
            .expect_health_check()
            .returning(|| Err(RedemptionError::Redemption("Unimplemented".into())));

        let err = pipeline(MockRedemptionRepository::new(), client)
            .health_check()
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }

    #[tokio::test]
    async fn test_on_unavailable_records_probe_error() {
        let fixture = Fixture::new();
        let mut repo = MockRedemptionRepository::new();
        let subscription_id = fixture.task.subscription_id;
        repo.expect_record_failure()
            .withf(move |f| {
                f.subscription_id == subscription_id && f.error_message.contains("connection refused")
            })
            .times(1)
            .returning(|_| Ok(()));

        pipeline(repo, MockDelegationClient::new())
            .on_unavailable(&fixture.task, &WorkerError::unavailable("connection refused"))
            .await
            .unwrap();
    }
}
