pub mod auth;
pub mod claims;
pub mod media;
pub mod notifications;
pub mod rate_limiter;
pub mod reports;
pub mod users;
pub mod validation;
