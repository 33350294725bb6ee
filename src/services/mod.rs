pub mod announcements;
pub mod audit;
pub mod auth;
pub mod metrics;
pub mod tenants;
pub mod users;
