//! Scholarship portal client.
//!
//! The pieces, bottom-up: [`storage`] persists the token and a few cached
//! values, [`api::HttpClient`] talks to the portal server, [`services`] are the
//! typed per-resource calls, [`state`] holds one resource each, and
//! [`loader::UserDataLoader`] prefetches the dashboard data whenever a
//! session is acquired. [`portal::Portal`] wires them together.

pub mod api;
pub mod config;
pub mod error;
pub mod loader;
pub mod portal;
pub mod routes;
pub mod services;
pub mod signup;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::ClientConfig;
pub use error::ClientError;
pub use portal::Portal;
pub use validation::ValidationError;
