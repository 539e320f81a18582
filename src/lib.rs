//! EUK gateway - API proxy in front of the EUK case-management backend.
//!
//! Inbound, the endpoint listing endangered persons is guarded by a per-client
//! rate limiter. Outbound, every backend call is queued on a governor that
//! bounds how many run at once.

pub mod backend;
pub mod config;
pub mod error;
pub mod governor;
pub mod handlers;
pub mod metrics;
pub mod mock;
pub mod models;
pub mod rate_limit;
pub mod state;
