//! Infrastructure adapters.
//!
//! Outbound: libsql and in-memory stores, hosted identity. Inbound: HTTP and CLI.
//! Outbound adapters map their errors to DomainError.

pub mod cli;
pub mod http;
pub mod identity;
pub mod persistence;
