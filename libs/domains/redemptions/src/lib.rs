//! Redemptions Domain
//!
//! Asynchronous execution of subscription redemptions against the delegation
//! service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← POST /redemptions, 202 / 400 / 503
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Processor  │  ← Worker pool, bounded queue, circuit breaker
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Pipeline   │  ← Probe, lookups, redeem, persist outcome
//! └──┬───────┬──┘
//!    │       │
//! ┌──▼───┐ ┌─▼──────┐
//! │ Repo │ │ Client │  ← sea-orm / tonic
//! └──────┘ └────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_redemptions::{
//!     DelegationServiceConfig, GrpcDelegationClient, PgRedemptionRepository,
//!     RedemptionConfig, RedemptionProcessor,
//! };
//! use sea_orm::Database;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//! let config = RedemptionConfig::new(DelegationServiceConfig::new("http://[::1]:50051"));
//!
//! let repository = Arc::new(PgRedemptionRepository::new(db));
//! let client = Arc::new(GrpcDelegationClient::connect_lazy(&config.delegation)?);
//!
//! let processor = RedemptionProcessor::new(repository, client, &config);
//! processor.start();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod postgres;
pub mod processor;
pub mod repository;

// Re-export commonly used types
pub use client::{DelegationClient, DelegationServiceConfig, GrpcDelegationClient};
pub use config::RedemptionConfig;
pub use error::{RedemptionError, RedemptionResult};
pub use handlers::ApiDoc;
pub use models::{
    Caveat, DelegationData, DelegationPayload, ExecutionPayload, Network, Product, ProductToken,
    QueueRedemption, QueueRedemptionResponse, RedemptionFailure, RedemptionSuccess,
    RedemptionTask, Token, Wallet,
};
pub use pipeline::{format_price, RedemptionPipeline};
pub use postgres::PgRedemptionRepository;
pub use processor::RedemptionProcessor;
pub use repository::RedemptionRepository;
