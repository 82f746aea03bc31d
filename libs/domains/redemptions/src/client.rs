use async_trait::async_trait;
use rpc::delegation::v1::{
    self as pb, delegation_service_client::DelegationServiceClient, HealthCheckRequest,
    RedeemDelegationRequest,
};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tracing::{debug, error};

use crate::error::{RedemptionError, RedemptionResult};
use crate::models::{DelegationPayload, ExecutionPayload};

/// Remote service that executes delegated transfers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DelegationClient: Send + Sync {
    /// Cheap liveness probe, called before every redemption
    async fn health_check(&self) -> RedemptionResult<()>;

    /// Execute the transfer and return its transaction hash
    async fn redeem_delegation(
        &self,
        delegation: DelegationPayload,
        execution: ExecutionPayload,
    ) -> RedemptionResult<String>;
}

#[derive(Debug, Clone)]
pub struct DelegationServiceConfig {
    pub addr: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl DelegationServiceConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// gRPC implementation of [`DelegationClient`]
#[derive(Clone)]
pub struct GrpcDelegationClient {
    client: DelegationServiceClient<Channel>,
}

impl GrpcDelegationClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: DelegationServiceClient::new(channel),
        }
    }

    /// Build a client whose channel connects on the first request.
    ///
    /// Startup does not depend on the delegation service being reachable;
    /// an outage surfaces later as a failed health probe.
    pub fn connect_lazy(config: &DelegationServiceConfig) -> RedemptionResult<Self> {
        let endpoint = Endpoint::from_shared(config.addr.clone()).map_err(|e| {
            error!(target: "grpc_client", addr = %config.addr, error = ?e, "Invalid URI");
            RedemptionError::InvalidData(format!(
                "invalid delegation service address {}: {e}",
                config.addr
            ))
        })?;

        let endpoint = endpoint
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .tcp_nodelay(true);

        debug!(
            target: "grpc_client",
            addr = %config.addr,
            "Creating lazy gRPC channel (connects on first request)"
        );

        Ok(Self::new(endpoint.connect_lazy()))
    }
}

fn status_to_error(status: tonic::Status) -> RedemptionError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
            RedemptionError::Unavailable(status.message().to_string())
        }
        code => RedemptionError::Redemption(format!("{code:?}: {}", status.message())),
    }
}

fn to_request(delegation: DelegationPayload, execution: ExecutionPayload) -> RedeemDelegationRequest {
    RedeemDelegationRequest {
        delegation: Some(pb::Delegation {
            delegate: delegation.delegate,
            delegator: delegation.delegator,
            authority: delegation.authority,
            caveats: delegation
                .caveats
                .into_iter()
                .map(|c| pb::Caveat {
                    enforcer: c.enforcer,
                    terms: c.terms,
                    args: c.args,
                })
                .collect(),
            salt: delegation.salt,
            signature: delegation.signature,
        }),
        merchant_address: execution.merchant_address,
        token_contract_address: execution.token_contract_address,
        price: execution.price,
        chain_id: execution.chain_id,
        network_name: execution.network_name,
    }
}

#[async_trait]
impl DelegationClient for GrpcDelegationClient {
    async fn health_check(&self) -> RedemptionResult<()> {
        let response = self
            .client
            .clone()
            .health_check(HealthCheckRequest {})
            .await
            .map_err(status_to_error)?
            .into_inner();

        if !response.healthy {
            return Err(RedemptionError::Unavailable(if response.message.is_empty() {
                "delegation service reported unhealthy".to_string()
            } else {
                response.message
            }));
        }
        Ok(())
    }

    async fn redeem_delegation(
        &self,
        delegation: DelegationPayload,
        execution: ExecutionPayload,
    ) -> RedemptionResult<String> {
        let response = self
            .client
            .clone()
            .redeem_delegation(to_request(delegation, execution))
            .await
            .map_err(status_to_error)?
            .into_inner();

        if !response.success {
            return Err(RedemptionError::Redemption(if response.error_message.is_empty() {
                "delegation service rejected the redemption".to_string()
            } else {
                response.error_message
            }));
        }
        if response.transaction_hash.is_empty() {
            return Err(RedemptionError::Redemption(
                "no transaction hash returned".to_string(),
            ));
        }
        Ok(response.transaction_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Caveat;
    use rpc::delegation::v1::delegation_service_server::{
        DelegationService, DelegationServiceServer,
    };
    use rpc::delegation::v1::{HealthCheckResponse, RedeemDelegationResponse};
    use std::sync::{Arc, Mutex};
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tonic::{Request, Response, Status};

    #[derive(Default)]
    struct FakeDelegationService {
        unhealthy: bool,
        reply: Option<RedeemDelegationResponse>,
        status: Option<Code>,
        received: Mutex<Vec<RedeemDelegationRequest>>,
    }

    #[tonic::async_trait]
    impl DelegationService for FakeDelegationService {
        async fn health_check(
            &self,
            _request: Request<HealthCheckRequest>,
        ) -> Result<Response<HealthCheckResponse>, Status> {
            Ok(Response::new(HealthCheckResponse {
                healthy: !self.unhealthy,
                message: if self.unhealthy { "rpc node lagging".into() } else { String::new() },
            }))
        }

        async fn redeem_delegation(
            &self,
            request: Request<RedeemDelegationRequest>,
        ) -> Result<Response<RedeemDelegationResponse>, Status> {
            if let Some(code) = self.status {
                return Err(Status::new(code, "scripted"));
            }
            self.received.lock().unwrap().push(request.into_inner());
            Ok(Response::new(self.reply.clone().unwrap_or_default()))
        }
    }

    async fn serve(service: Arc<FakeDelegationService>) -> GrpcDelegationClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            Server::builder()
                .add_service(DelegationServiceServer::from_arc(service))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });
        GrpcDelegationClient::connect_lazy(&DelegationServiceConfig::new(format!("http://{addr}")))
            .unwrap()
    }

    fn payloads() -> (DelegationPayload, ExecutionPayload) {
        (
            DelegationPayload {
                delegate: "0xdelegate".into(),
                delegator: "0xdelegator".into(),
                authority: "0xroot".into(),
                caveats: vec![Caveat {
                    enforcer: "0xenforcer".into(),
                    terms: "0x01".into(),
                    args: "0x".into(),
                }],
                salt: "42".into(),
                signature: "0xsig".into(),
            },
            ExecutionPayload {
                merchant_address: "0xmerchant".into(),
                token_contract_address: "0xtoken".into(),
                price: "10.5".into(),
                chain_id: 8453,
                network_name: "base".into(),
            },
        )
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_to_error(Status::unavailable("down")),
            RedemptionError::Unavailable(_)
        ));
        assert!(matches!(
            status_to_error(Status::deadline_exceeded("slow")),
            RedemptionError::Unavailable(_)
        ));
        assert!(matches!(
            status_to_error(Status::cancelled("Timeout expired")),
            RedemptionError::Unavailable(_)
        ));
        assert!(matches!(
            status_to_error(Status::invalid_argument("bad caveat")),
            RedemptionError::Redemption(_)
        ));
        assert!(matches!(
            status_to_error(Status::internal("reverted")),
            RedemptionError::Redemption(_)
        ));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let result = GrpcDelegationClient::connect_lazy(&DelegationServiceConfig::new("not a uri"));
        assert!(matches!(result, Err(RedemptionError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_health_check() {
        let client = serve(Arc::new(FakeDelegationService::default())).await;
        client.health_check().await.unwrap();

        let client = serve(Arc::new(FakeDelegationService {
            unhealthy: true,
            ..Default::default()
        }))
        .await;
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, RedemptionError::Unavailable(ref m) if m == "rpc node lagging"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GrpcDelegationClient::connect_lazy(
            &DelegationServiceConfig::new(format!("http://{addr}"))
                .with_connect_timeout(Duration::from_secs(1)),
        )
        .unwrap();

        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, RedemptionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_redeem_sends_payloads_and_returns_hash() {
        let service = Arc::new(FakeDelegationService {
            reply: Some(RedeemDelegationResponse {
                transaction_hash: "0xabc".into(),
                success: true,
                error_message: String::new(),
            }),
            ..Default::default()
        });
        let client = serve(Arc::clone(&service)).await;

        let (delegation, execution) = payloads();
        let hash = client.redeem_delegation(delegation, execution).await.unwrap();
        assert_eq!(hash, "0xabc");

        let received = service.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let request = &received[0];
        assert_eq!(request.price, "10.5");
        assert_eq!(request.chain_id, 8453);
        assert_eq!(request.merchant_address, "0xmerchant");
        let delegation = request.delegation.as_ref().unwrap();
        assert_eq!(delegation.delegator, "0xdelegator");
        assert_eq!(delegation.caveats[0].enforcer, "0xenforcer");
    }

    #[tokio::test]
    async fn test_rejected_or_empty_hash_is_redemption_error() {
        let client = serve(Arc::new(FakeDelegationService {
            reply: Some(RedeemDelegationResponse {
                transaction_hash: String::new(),
                success: false,
                error_message: "insufficient allowance".into(),
            }),
            ..Default::default()
        }))
        .await;
        let (delegation, execution) = payloads();
        let err = client.redeem_delegation(delegation, execution).await.unwrap_err();
        assert!(matches!(err, RedemptionError::Redemption(ref m) if m == "insufficient allowance"));

        let client = serve(Arc::new(FakeDelegationService {
            reply: Some(RedeemDelegationResponse {
                transaction_hash: String::new(),
                success: true,
                error_message: String::new(),
            }),
            ..Default::default()
        }))
        .await;
        let (delegation, execution) = payloads();
        let err = client.redeem_delegation(delegation, execution).await.unwrap_err();
        assert!(matches!(err, RedemptionError::Redemption(_)));
    }

    #[tokio::test]
    async fn test_server_error_status_maps_to_redemption_error() {
        let client = serve(Arc::new(FakeDelegationService {
            status: Some(Code::FailedPrecondition),
            ..Default::default()
        }))
        .await;
        let (delegation, execution) = payloads();
        let err = client.redeem_delegation(delegation, execution).await.unwrap_err();
        assert!(matches!(err, RedemptionError::Redemption(_)));
    }
}
