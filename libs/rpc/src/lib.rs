//! Generated protobuf messages and gRPC stubs.
//!
//! Sources live under `proto/`; the code in `src/generated` is produced by
//! `buf generate` and checked in.

pub mod delegation {
    pub mod v1 {
        include!("generated/delegation/v1/delegation.v1.rs");
        // delegation.v1.tonic.rs is included by delegation.v1.rs
    }
}
