//! Gateways implemented in this crate
//!
//! The HTTP gateway for the hosted row store lives in `folio-supabase`; this
//! module holds the in-memory one used for tests and offline work.

pub mod memory;

pub use memory::{GatewayCall, GatewayOp, MemoryCollection};
