use bytes::Bytes;
use cassandra_proxy_protocol::query::QueryParams;

/// Parameters of a statement.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StatementParams {
    /// Protocol-level parameters.
    pub query_params: QueryParams,
    /// The partition key the proxy uses to pick the backend shard. An absent or empty key lets
    /// the proxy choose.
    pub routing_key: Option<Bytes>,
}
