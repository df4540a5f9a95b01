//! Turnstile - HTTP transaction gateway for a permissioned token ledger
//!
//! Turnstile lets client applications mint, transfer, burn, and query
//! ownership records without managing ledger connectivity, identity
//! credentials, or channel/contract bindings themselves.
//!
//! ## Components
//!
//! - **wallet**: identity resolution and enrollment over on-disk credentials
//! - **ledger**: wire codec, authenticated peer sessions, the identity-keyed
//!   connection pool, and the transaction dispatcher
//! - **ops**: the declarative operation table driving one generic handler
//! - **routes** / **server**: the HTTP surface and response envelope

pub mod config;
pub mod ledger;
pub mod ops;
pub mod routes;
pub mod server;
pub mod types;
pub mod wallet;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
