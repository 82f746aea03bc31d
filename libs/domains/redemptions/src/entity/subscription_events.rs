use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::models::{RedemptionFailure, RedemptionSuccess};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum EventType {
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
    #[sea_orm(string_value = "failed_redemption")]
    FailedRedemption,
}

/// Append-only history of redemption outcomes
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "subscription_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: EventType,
    pub transaction_hash: Option<String>,
    pub amount_in_cents: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<RedemptionSuccess> for ActiveModel {
    fn from(success: RedemptionSuccess) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            subscription_id: Set(success.subscription_id),
            event_type: Set(EventType::Redeemed),
            transaction_hash: Set(Some(success.transaction_hash)),
            amount_in_cents: Set(success.amount_in_cents),
            error_message: Set(None),
            metadata: Set(success.metadata),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}

impl From<RedemptionFailure> for ActiveModel {
    fn from(failure: RedemptionFailure) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            subscription_id: Set(failure.subscription_id),
            event_type: Set(EventType::FailedRedemption),
            transaction_hash: Set(None),
            amount_in_cents: Set(failure.amount_in_cents),
            error_message: Set(Some(failure.error_message)),
            metadata: Set(failure.metadata),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
