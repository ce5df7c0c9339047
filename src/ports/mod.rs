//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by HTTP/CLI adapters into the application
//! - Outbound: Called by application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::TutoringApi;
pub use outbound::{
    AccountStore, DirectoryPort, IdentityPort, NotificationStore, RequestStore, SessionFilter,
    SessionStore,
};
