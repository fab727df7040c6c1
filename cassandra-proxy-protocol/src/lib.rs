//! Cassandra protocol types needed to talk to a multiplexing proxy.
//! Built in coordination with cdrs-tokio-proxy, but usable on its own, e.g. on the proxy side
//! to decode routed requests.

pub mod frame;
pub mod query;
pub mod types;

pub mod compression;
pub mod consistency;
pub mod error;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
