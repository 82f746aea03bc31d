use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_worker::WorkerTask;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn empty_metadata() -> Value {
    Value::Object(Default::default())
}

/// One redemption to execute for a subscription.
///
/// Created per request and never mutated. A task parked by the circuit
/// breaker is resubmitted as the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionTask {
    pub subscription_id: Uuid,
    pub delegation_id: Uuid,
    pub product_id: Uuid,
    pub product_token_id: Uuid,
    pub amount_in_cents: i64,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl WorkerTask for RedemptionTask {
    fn task_id(&self) -> String {
        self.subscription_id.to_string()
    }
}

/// DTO for queueing a redemption
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QueueRedemption {
    pub subscription_id: Uuid,
    pub delegation_id: Uuid,
    pub product_id: Uuid,
    pub product_token_id: Uuid,
    #[validate(range(min = 1))]
    pub amount_in_cents: i64,
    #[serde(default = "empty_metadata")]
    #[schema(value_type = Object)]
    pub metadata: Value,
}

impl From<QueueRedemption> for RedemptionTask {
    fn from(input: QueueRedemption) -> Self {
        Self {
            subscription_id: input.subscription_id,
            delegation_id: input.delegation_id,
            product_id: input.product_id,
            product_token_id: input.product_token_id,
            amount_in_cents: input.amount_in_cents,
            metadata: input.metadata,
        }
    }
}

/// Response for an accepted redemption
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueRedemptionResponse {
    pub status: String,
    pub subscription_id: Uuid,
}

impl QueueRedemptionResponse {
    pub fn accepted(subscription_id: Uuid) -> Self {
        Self {
            status: "accepted".to_string(),
            subscription_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    pub enforcer: String,
    pub terms: String,
    pub args: String,
}

/// Signed delegation as stored for a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationData {
    pub id: Uuid,
    pub delegate: String,
    pub delegator: String,
    pub authority: String,
    pub caveats: Vec<Caveat>,
    pub salt: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub wallet_id: Uuid,
    pub name: String,
    pub price_in_pennies: i64,
}

/// Merchant wallet receiving the redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub wallet_address: String,
}

/// Token a product can be paid in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductToken {
    pub id: Uuid,
    pub product_id: Uuid,
    pub network_id: Uuid,
    pub token_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub network_id: Uuid,
    pub symbol: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: Uuid,
    pub name: String,
    pub chain_id: i64,
}

/// Delegation half of a redemption call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationPayload {
    pub delegate: String,
    pub delegator: String,
    pub authority: String,
    pub caveats: Vec<Caveat>,
    pub salt: String,
    pub signature: String,
}

impl From<DelegationData> for DelegationPayload {
    fn from(data: DelegationData) -> Self {
        Self {
            delegate: data.delegate,
            delegator: data.delegator,
            authority: data.authority,
            caveats: data.caveats,
            salt: data.salt,
            signature: data.signature,
        }
    }
}

/// Transfer half of a redemption call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPayload {
    pub merchant_address: String,
    pub token_contract_address: String,
    /// Decimal amount, e.g. "10.5"
    pub price: String,
    pub chain_id: i64,
    pub network_name: String,
}

/// Successful redemption outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedemptionSuccess {
    pub subscription_id: Uuid,
    pub transaction_hash: String,
    pub amount_in_cents: i64,
    pub metadata: Value,
}

/// Failed redemption outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedemptionFailure {
    pub subscription_id: Uuid,
    pub amount_in_cents: i64,
    pub error_message: String,
    pub metadata: Value,
}

impl RedemptionFailure {
    pub fn for_task(task: &RedemptionTask, error_message: impl Into<String>) -> Self {
        Self {
            subscription_id: task.subscription_id,
            amount_in_cents: task.amount_in_cents,
            error_message: error_message.into(),
            metadata: task.metadata.clone(),
        }
    }
}
