//! Library surface behind the `builder-service` binary, split out so
//! `tests/` integration tests can drive the real router the same way the
//! binary does instead of re-deriving it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod test_support;
