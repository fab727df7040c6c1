use bytes::Bytes;
use cassandra_proxy_protocol::consistency::Consistency;
use cassandra_proxy_protocol::query::{QueryParams, QueryValues};
use cassandra_proxy_protocol::types::{CInt, CLong};

use crate::statement::StatementParams;

#[derive(Default, Debug)]
pub struct StatementParamsBuilder {
    consistency: Consistency,
    values: Option<QueryValues>,
    page_size: Option<CInt>,
    paging_state: Option<Vec<u8>>,
    serial_consistency: Option<Consistency>,
    timestamp: Option<CLong>,
    routing_key: Option<Bytes>,
}

impl StatementParamsBuilder {
    pub fn new() -> StatementParamsBuilder {
        Default::default()
    }

    /// Sets new statement consistency
    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Sets new statement values.
    #[must_use]
    pub fn with_values(mut self, values: QueryValues) -> Self {
        self.values = Some(values);
        self
    }

    /// Sets new page size.
    #[must_use]
    pub fn with_page_size(mut self, size: CInt) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets new paging state.
    #[must_use]
    pub fn with_paging_state(mut self, state: Vec<u8>) -> Self {
        self.paging_state = Some(state);
        self
    }

    /// Sets new serial consistency.
    #[must_use]
    pub fn with_serial_consistency(mut self, serial_consistency: Consistency) -> Self {
        self.serial_consistency = Some(serial_consistency);
        self
    }

    /// Sets new timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: CLong) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets new explicit routing key.
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<Bytes>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    #[must_use]
    pub fn build(self) -> StatementParams {
        StatementParams {
            query_params: QueryParams {
                consistency: self.consistency,
                values: self.values,
                page_size: self.page_size,
                paging_state: self.paging_state,
                serial_consistency: self.serial_consistency,
                timestamp: self.timestamp,
            },
            routing_key: self.routing_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cassandra_proxy_protocol::consistency::Consistency;

    use crate::statement::StatementParamsBuilder;

    #[test]
    fn should_build_params_with_routing_key() {
        let params = StatementParamsBuilder::new()
            .with_consistency(Consistency::LocalQuorum)
            .with_page_size(100)
            .with_routing_key(&b"partition-7"[..])
            .build();

        assert_eq!(params.query_params.consistency, Consistency::LocalQuorum);
        assert_eq!(params.query_params.page_size, Some(100));
        assert_eq!(params.routing_key, Some(Bytes::from_static(b"partition-7")));
    }

    #[test]
    fn should_build_params_without_routing_key() {
        let params = StatementParamsBuilder::new().build();
        assert_eq!(params.routing_key, None);
    }
}
