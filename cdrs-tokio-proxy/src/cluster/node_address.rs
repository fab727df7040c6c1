use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

/// Address of the proxy. Can be a direct socket address or a hostname. A hostname is resolved
/// when the configuration is built and the first resolved address is used.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum NodeAddress {
    Direct(SocketAddr),
    Hostname(String),
}

impl Display for NodeAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeAddress::Direct(addr) => write!(f, "{addr}"),
            NodeAddress::Hostname(hostname) => f.write_str(hostname),
        }
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        NodeAddress::Direct(addr)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        NodeAddress::Hostname(value)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        NodeAddress::Hostname(value.to_string())
    }
}
