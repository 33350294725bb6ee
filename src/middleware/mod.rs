pub mod auth;
pub mod rate_limit;
pub mod roles;
pub mod super_admin;
pub mod tenant;
