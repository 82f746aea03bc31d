use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::{
        delegation_data, networks, products, products_tokens, subscription_events, subscriptions,
        tokens, wallets,
    },
    error::{RedemptionError, RedemptionResult},
    models::{
        DelegationData, Network, Product, ProductToken, RedemptionFailure, RedemptionSuccess,
        Token, Wallet,
    },
    repository::RedemptionRepository,
};

pub struct PgRedemptionRepository {
    db: DatabaseConnection,
}

impl PgRedemptionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RedemptionRepository for PgRedemptionRepository {
    async fn get_delegation(&self, id: Uuid) -> RedemptionResult<Option<DelegationData>> {
        delegation_data::Entity::find_by_id(id)
            .filter(delegation_data::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .map(DelegationData::try_from)
            .transpose()
    }

    async fn get_product(&self, id: Uuid) -> RedemptionResult<Option<Product>> {
        let model = products::Entity::find_by_id(id)
            .filter(products::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn get_wallet(&self, id: Uuid, workspace_id: Uuid) -> RedemptionResult<Option<Wallet>> {
        let model = wallets::Entity::find_by_id(id)
            .filter(wallets::Column::WorkspaceId.eq(workspace_id))
            .filter(wallets::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn get_product_token(&self, id: Uuid) -> RedemptionResult<Option<ProductToken>> {
        let model = products_tokens::Entity::find_by_id(id)
            .filter(products_tokens::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn get_token(&self, id: Uuid) -> RedemptionResult<Option<Token>> {
        let model = tokens::Entity::find_by_id(id)
            .filter(tokens::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn get_network(&self, id: Uuid) -> RedemptionResult<Option<Network>> {
        let model = networks::Entity::find_by_id(id)
            .filter(networks::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn record_failure(&self, failure: RedemptionFailure) -> RedemptionResult<()> {
        let subscription_id = failure.subscription_id;
        let active_model: subscription_events::ActiveModel = failure.into();

        subscription_events::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await?;

        tracing::info!(%subscription_id, "Recorded failed redemption");
        Ok(())
    }

    async fn record_success(&self, success: RedemptionSuccess) -> RedemptionResult<()> {
        let subscription_id = success.subscription_id;
        let active_model: subscription_events::ActiveModel = success.into();

        subscription_events::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await?;

        tracing::info!(%subscription_id, "Recorded redemption");
        Ok(())
    }

    async fn update_next_redemption(
        &self,
        subscription_id: Uuid,
        next_redemption_at: DateTime<Utc>,
    ) -> RedemptionResult<()> {
        let next: sea_orm::prelude::DateTimeWithTimeZone = next_redemption_at.into();
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::NextRedemptionDate, Expr::value(next))
            .col_expr(subscriptions::Column::UpdatedAt, Expr::value(now))
            .filter(subscriptions::Column::Id.eq(subscription_id))
            .filter(subscriptions::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RedemptionError::not_found("subscription", subscription_id));
        }

        tracing::debug!(%subscription_id, %next_redemption_at, "Scheduled next redemption");
        Ok(())
    }
}
