mod admin;

pub use admin::{AdminAuthFactory, AdminAuthService, AdminToken};
