//! Application use cases. Orchestrate domain logic via ports.

pub mod account_service;
pub mod catalog_service;
pub mod desk;
pub mod notification_service;
pub mod request_lifecycle;
pub mod session_service;
pub mod stats_aggregator;

pub use account_service::AccountService;
pub use catalog_service::CatalogService;
pub use desk::{DeskSettings, TutoringDesk};
pub use notification_service::NotificationService;
pub use request_lifecycle::RequestLifecycle;
pub use session_service::SessionService;
pub use stats_aggregator::StatsAggregator;
