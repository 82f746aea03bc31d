// @generated
// This file is @generated by prost-build.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Caveat {
    #[prost(string, tag = "1")]
    pub enforcer: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub terms: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub args: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Delegation {
    #[prost(string, tag = "1")]
    pub delegate: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub delegator: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub authority: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub caveats: ::prost::alloc::vec::Vec<Caveat>,
    #[prost(string, tag = "5")]
    pub salt: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub signature: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct RedeemDelegationRequest {
    #[prost(message, optional, tag = "1")]
    pub delegation: ::core::option::Option<Delegation>,
    #[prost(string, tag = "2")]
    pub merchant_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub token_contract_address: ::prost::alloc::string::String,
    /// Decimal token amount, e.g. "10.5"
    #[prost(string, tag = "4")]
    pub price: ::prost::alloc::string::String,
    #[prost(int64, tag = "5")]
    pub chain_id: i64,
    #[prost(string, tag = "6")]
    pub network_name: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct RedeemDelegationResponse {
    #[prost(string, tag = "1")]
    pub transaction_hash: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub error_message: ::prost::alloc::string::String,
}
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct HealthCheckRequest {}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(bool, tag = "1")]
    pub healthy: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}
include!("delegation.v1.tonic.rs");
// @@protoc_insertion_point(module)
