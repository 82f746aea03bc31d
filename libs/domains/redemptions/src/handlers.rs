use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use task_worker::WorkerError;
use utoipa::{OpenApi, ToSchema};
use validator::Validate;

use crate::client::DelegationClient;
use crate::error::RedemptionError;
use crate::models::{QueueRedemption, QueueRedemptionResponse};
use crate::processor::RedemptionProcessor;
use crate::repository::RedemptionRepository;

/// Seconds a client should wait before retrying a rejected redemption
pub const RETRY_AFTER_SECS: u64 = 5;

/// OpenAPI documentation for the Redemptions API
#[derive(OpenApi)]
#[openapi(
    paths(queue_redemption),
    components(schemas(QueueRedemption, QueueRedemptionResponse, ErrorResponse)),
    tags((name = "redemptions", description = "Asynchronous subscription redemptions"))
)]
pub struct ApiDoc;

/// Error body shared by every non-2xx response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for RedemptionError {
    fn into_response(self) -> Response {
        match self {
            RedemptionError::Queue(WorkerError::QueueFull) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                Json(ErrorResponse::new("ServiceUnavailable", self.to_string())),
            )
                .into_response(),
            RedemptionError::Queue(_) | RedemptionError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("ServiceUnavailable", self.to_string())),
            )
                .into_response(),
            RedemptionError::InvalidData(_) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("BadRequest", self.to_string())),
            )
                .into_response(),
            RedemptionError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("NotFound", self.to_string())),
            )
                .into_response(),
            RedemptionError::Database(_) | RedemptionError::Redemption(_) => {
                tracing::error!(error = %self, "Unexpected error in redemption handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("InternalServerError", "Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

/// JSON body extractor that runs `validator` rules before the handler
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| e.into_response())?;

        data.validate().map_err(|e| {
            let details = e
                .field_errors()
                .iter()
                .map(|(field, errors)| {
                    let messages: Vec<Value> = errors
                        .iter()
                        .map(|err| json!({ "code": err.code, "params": err.params }))
                        .collect();
                    (field.to_string(), Value::Array(messages))
                })
                .collect::<serde_json::Map<_, _>>();

            let body = ErrorResponse {
                error: "BadRequest".to_string(),
                message: "Request validation failed".to_string(),
                details: Some(Value::Object(details)),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        })?;

        Ok(ValidatedJson(data))
    }
}

/// Create the redemptions router
pub fn router<R, C>(processor: Arc<RedemptionProcessor<R, C>>) -> Router
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    Router::new()
        .route("/", post(queue_redemption::<R, C>))
        .with_state(processor)
}

/// Queue a redemption for asynchronous execution
#[utoipa::path(
    post,
    path = "",
    tag = "redemptions",
    request_body = QueueRedemption,
    responses(
        (status = 202, description = "Redemption accepted", body = QueueRedemptionResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 503, description = "Queue full, retry later", body = ErrorResponse,
            headers(("Retry-After" = u64, description = "Seconds to wait before retrying")))
    )
)]
async fn queue_redemption<R, C>(
    State(processor): State<Arc<RedemptionProcessor<R, C>>>,
    ValidatedJson(input): ValidatedJson<QueueRedemption>,
) -> Result<impl IntoResponse, RedemptionError>
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    let subscription_id = input.subscription_id;
    processor.queue_redemption(input.into()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(QueueRedemptionResponse::accepted(subscription_id)),
    ))
}
