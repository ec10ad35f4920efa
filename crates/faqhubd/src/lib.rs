//! faqhubd library - exposes modules for testing.

pub mod auth;
pub mod control;
pub mod presence;
pub mod routes;
pub mod server;
pub mod storage;
