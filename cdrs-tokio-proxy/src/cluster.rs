pub use crate::cluster::config_proxy::{ProxyConnectionConfig, ProxyConnectionConfigBuilder};
pub use crate::cluster::connection::{ConnectionState, ProxyConnection, ProxyConnectionBuilder};
pub use crate::cluster::node_address::NodeAddress;
pub use crate::cluster::response_future::{
    DefaultResponseFutureFactory, ResponseFuture, ResponseFutureFactory,
};
pub use crate::cluster::session::{ProxySession, ProxySessionBuilder};

mod config_proxy;
mod connection;
mod node_address;
mod response_future;
pub mod session;
pub mod topology;
