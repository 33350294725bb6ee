//! Consumer side of the API: the HTTP client used by dashboards and tools,
//! the latest-announcement query cache, the banner store and role gating.

pub mod announcements;
pub mod guard;
pub mod http;
pub mod store;

pub use announcements::{AnnouncementBanner, AnnouncementQueries};
pub use guard::{GuardOutcome, RoleGuard, Session};
pub use http::{ApiClient, ClientError, Interceptor, LoggingInterceptor};
pub use store::AnnouncementStore;
