use cassandra_proxy_protocol::compression::Compression;
use cassandra_proxy_protocol::frame::Version;
use std::net::SocketAddr;
use tokio::net::lookup_host;

use crate::cluster::NodeAddress;
use crate::error::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Resolved configuration of a connection to the proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyConnectionConfig {
    addr: SocketAddr,
    compression: Compression,
    version: Version,
    buffer_size: usize,
    tcp_nodelay: bool,
}

impl ProxyConnectionConfig {
    /// Address of the proxy endpoint.
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Compression registered with every transport for the lifetime of the connection.
    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Capacity of the write queue, in frames.
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    pub fn tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }
}

/// Builder structure that helps to configure the proxy connection.
#[derive(Clone, Debug)]
pub struct ProxyConnectionConfigBuilder {
    addr: NodeAddress,
    compression: Compression,
    version: Version,
    buffer_size: usize,
    tcp_nodelay: bool,
}

impl ProxyConnectionConfigBuilder {
    /// Creates a new configuration builder with given proxy address.
    pub fn new(addr: NodeAddress) -> Self {
        ProxyConnectionConfigBuilder {
            addr,
            compression: Compression::default(),
            version: Version::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            tcp_nodelay: true,
        }
    }

    /// Sets frame compression. Snappy by default.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets protocol version. Only versions supporting custom payloads are accepted.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the write queue capacity.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_tcp_nodelay(mut self, tcp_nodelay: bool) -> Self {
        self.tcp_nodelay = tcp_nodelay;
        self
    }

    /// Finalizes building process
    pub async fn build(self) -> Result<ProxyConnectionConfig> {
        if !self.version.supports_custom_payload() {
            return Err(Error::Configuration(format!(
                "Protocol version {} cannot carry routing keys!",
                self.version
            )));
        }

        if self.buffer_size == 0 {
            return Err(Error::Configuration(
                "Write buffer size must be greater than 0!".into(),
            ));
        }

        let addr = match self.addr {
            NodeAddress::Direct(addr) => addr,
            NodeAddress::Hostname(hostname) => lookup_host(&hostname)
                .await?
                .next()
                .ok_or_else(|| {
                    Error::Configuration(format!("Cannot resolve proxy address: {hostname}"))
                })?,
        };

        Ok(ProxyConnectionConfig {
            addr,
            compression: self.compression,
            version: self.version,
            buffer_size: self.buffer_size,
            tcp_nodelay: self.tcp_nodelay,
        })
    }
}
