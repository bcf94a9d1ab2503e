//! rotor - a failover-aware round-robin HTTP reverse proxy
//!
//! This crate provides a reverse proxy that spreads inbound HTTP requests
//! across a fixed set of upstream backends:
//! - Round-robin selection driven by a shared atomic cursor
//! - Reactive liveness: a backend leaves the rotation permanently after a
//!   transport-level forwarding failure
//! - Automatic retry against the remaining backends for the same request
//! - Transparent relaying of backend responses, error statuses included

pub mod config;
pub mod pool;
pub mod proxy;
pub mod server;
pub mod util;

pub use config::Config;
pub use pool::BackendPool;
