//! Cross-cutting helpers: configuration and call timeouts.

pub mod config;
pub mod timeout;
