//! **cdrs-tokio-proxy** is the connection and session layer of an async Cassandra driver for
//! talking to a multiplexing proxy instead of the cluster itself.
//!
//! The proxy routes every request to the right backend shard based on a routing key, so all
//! outgoing messages are wrapped in a proxied envelope carrying one. Capability negotiation is
//! done by the proxy, so connections are ready as soon as the socket is connected.
//!
//! ## Getting started
//!
//! ```no_run
//! use cdrs_tokio_proxy::cluster::topology::ProxyTopologyTracker;
//! use cdrs_tokio_proxy::cluster::{ProxyConnectionConfigBuilder, ProxySessionBuilder};
//! use cdrs_tokio_proxy::retry::ExponentialReconnectionPolicy;
//! use cdrs_tokio_proxy::transport::TcpConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProxyConnectionConfigBuilder::new("127.0.0.1:9042".into())
//!         .build()
//!         .await
//!         .unwrap();
//!     let connector = TcpConnector::from_config(&config);
//!     let tracker = Arc::new(ProxyTopologyTracker::new(
//!         config.addr(),
//!         connector.clone(),
//!         Arc::new(ExponentialReconnectionPolicy::default()),
//!     ));
//!
//!     let session = ProxySessionBuilder::new(config, connector)
//!         .with_topology_tracker(tracker.clone())
//!         .with_host_events(tracker.subscribe())
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     session
//!         .query("SELECT release_version FROM system.local")
//!         .await
//!         .expect("Query error");
//! }
//! ```

pub mod cluster;
pub mod frame_parser;
pub mod future;
pub mod retry;
pub mod statement;
pub mod transport;

pub use cassandra_proxy_protocol::compression;
pub use cassandra_proxy_protocol::consistency;
pub use cassandra_proxy_protocol::error;
pub use cassandra_proxy_protocol::frame;
pub use cassandra_proxy_protocol::query;
pub use cassandra_proxy_protocol::types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
