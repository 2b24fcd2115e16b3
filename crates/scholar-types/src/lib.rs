//! Data model shared by the portal server and the portal client.
//!
//! `models` holds the resources themselves, `api` the request/response
//! envelopes that travel over the REST boundary. Wire JSON is camelCase.

pub mod api;
pub mod models;

pub use models::*;
