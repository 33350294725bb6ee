pub mod announcement;
pub mod auth;
pub mod tenant;
pub mod user;
