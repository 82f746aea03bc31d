//! Sea-ORM entities for the tables the redemption pipeline reads and writes.
//!
//! Lookup tables use soft deletes: a row with `deleted_at` set is treated as
//! missing.

pub mod delegation_data;
pub mod networks;
pub mod products;
pub mod products_tokens;
pub mod subscription_events;
pub mod subscriptions;
pub mod tokens;
pub mod wallets;
