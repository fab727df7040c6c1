use bytes::Bytes;
use cassandra_proxy_protocol::consistency::Consistency;
use cassandra_proxy_protocol::frame::Frame;
use derivative::Derivative;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cluster::topology::{HostEvent, TopologyTracker};
use crate::cluster::{
    DefaultResponseFutureFactory, ProxyConnection, ProxyConnectionBuilder, ProxyConnectionConfig,
    ResponseFuture, ResponseFutureFactory,
};
use crate::error::{Error, Result};
use crate::statement::{Query, Statement, StatementParams, StatementParamsBuilder};
use crate::transport::TransportConnector;

/// Session talking to the cluster through a proxy. Every future it creates carries a routing key,
/// possibly an empty one.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ProxySession<C: TransportConnector + 'static> {
    #[derivative(Debug = "ignore")]
    connection: ProxyConnection<C>,
    #[derivative(Debug = "ignore")]
    future_factory: Arc<dyn ResponseFutureFactory>,
    default_consistency: Consistency,
}

impl<C: TransportConnector + 'static> ProxySession<C> {
    pub fn new(
        connection: ProxyConnection<C>,
        future_factory: Arc<dyn ResponseFutureFactory>,
        default_consistency: Consistency,
    ) -> Self {
        ProxySession {
            connection,
            future_factory,
            default_consistency,
        }
    }

    /// Creates a future for given query, with the message routing key taken from the query, or
    /// empty if the query has none.
    pub fn create_response_future(&self, query: Query) -> ResponseFuture {
        let routing_key = query
            .routing_key()
            .filter(|routing_key| !routing_key.is_empty())
            .cloned()
            .unwrap_or_else(Bytes::new);

        let mut future = self.future_factory.create_future(query);
        future.message.routing_key = Some(routing_key);
        future
    }

    /// Sends a previously created future.
    pub async fn send(&self, future: ResponseFuture) -> Result<Frame> {
        future.send_request(&self.connection).await
    }

    /// Executes a query with default parameters.
    pub async fn query<Q: ToString>(&self, query: Q) -> Result<Frame> {
        let params = StatementParamsBuilder::new()
            .with_consistency(self.default_consistency)
            .build();

        self.query_with_params(query, params).await
    }

    /// Executes a query with given parameters.
    pub async fn query_with_params<Q: ToString>(
        &self,
        query: Q,
        params: StatementParams,
    ) -> Result<Frame> {
        let query = Query::new(Statement::Simple(query.to_string()), params);
        self.send(self.create_response_future(query)).await
    }

    /// Prepares a query and returns the prepared statement id.
    pub async fn prepare<Q: ToString>(&self, query: Q) -> Result<Vec<u8>> {
        let response = self
            .send(self.create_response_future(Query::prepare(query.to_string())))
            .await?;

        response
            .response_body()?
            .into_result()
            .map(|result| result.prepared_id())
            .transpose()?
            .flatten()
            .ok_or_else(|| Error::General("Expected prepared statement id!".into()))
    }

    /// Executes a prepared statement.
    pub async fn execute(&self, id: Vec<u8>, params: StatementParams) -> Result<Frame> {
        self.send(self.create_response_future(Query::execute(id, params)))
            .await
    }

    #[inline]
    pub fn connection(&self) -> &ProxyConnection<C> {
        &self.connection
    }
}

/// Builder creating the proxy connection and the session on top of it.
pub struct ProxySessionBuilder<C: TransportConnector + 'static> {
    connection_builder: ProxyConnectionBuilder<C>,
    future_factory: Arc<dyn ResponseFutureFactory>,
    default_consistency: Consistency,
}

impl<C: TransportConnector + 'static> ProxySessionBuilder<C> {
    pub fn new(config: ProxyConnectionConfig, connector: C) -> Self {
        ProxySessionBuilder {
            connection_builder: ProxyConnectionBuilder::new(config, connector),
            future_factory: Arc::new(DefaultResponseFutureFactory),
            default_consistency: Consistency::default(),
        }
    }

    /// Sets the tracker notified when the proxy cannot be reached. Mandatory.
    pub fn with_topology_tracker(mut self, tracker: Arc<dyn TopologyTracker>) -> Self {
        self.connection_builder = self.connection_builder.with_topology_tracker(tracker);
        self
    }

    /// Sets the source of host events used to bring a closed connection back.
    pub fn with_host_events(mut self, host_events: broadcast::Receiver<HostEvent>) -> Self {
        self.connection_builder = self.connection_builder.with_host_events(host_events);
        self
    }

    /// Sets custom base future factory.
    pub fn with_future_factory(mut self, future_factory: Arc<dyn ResponseFutureFactory>) -> Self {
        self.future_factory = future_factory;
        self
    }

    /// Sets consistency used by [`ProxySession::query`].
    pub fn with_default_consistency(mut self, consistency: Consistency) -> Self {
        self.default_consistency = consistency;
        self
    }

    pub async fn build(self) -> Result<ProxySession<C>> {
        let connection = self.connection_builder.build().await?;
        Ok(ProxySession::new(
            connection,
            self.future_factory,
            self.default_consistency,
        ))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cassandra_proxy_protocol::consistency::{Consistency, RequestConsistency};
    use cassandra_proxy_protocol::frame::message_error::ErrorBody;
    use cassandra_proxy_protocol::frame::message_proxied::routing_key_of;
    use cassandra_proxy_protocol::frame::{Frame, Opcode, Version};
    use std::net::SocketAddr;
    use std::sync::Arc;

    use crate::cluster::topology::MockTopologyTracker;
    use crate::cluster::{
        ProxyConnectionConfigBuilder, ProxySession, ProxySessionBuilder, ResponseFuture,
        ResponseFutureFactory,
    };
    use crate::statement::{Query, Statement, StatementParamsBuilder};
    use crate::transport::test_support::{error_response, response_to, FakeConnector};
    use crate::Error;

    fn proxy_host() -> SocketAddr {
        "127.0.0.1:9042".parse().unwrap()
    }

    fn tracker() -> Arc<MockTopologyTracker> {
        let mut tracker = MockTopologyTracker::new();
        tracker.expect_proxy_host().return_const(proxy_host());
        tracker.expect_report_host_down().never();
        Arc::new(tracker)
    }

    async fn session(connector: &FakeConnector) -> ProxySession<FakeConnector> {
        let config = ProxyConnectionConfigBuilder::new(proxy_host().into())
            .build()
            .await
            .unwrap();

        ProxySessionBuilder::new(config, connector.clone())
            .with_topology_tracker(tracker())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_set_empty_routing_key_when_query_has_none() {
        let session = session(&FakeConnector::new()).await;

        let future = session.create_response_future(Query::simple("SELECT * FROM ks.t"));
        assert_eq!(future.message.routing_key, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn should_copy_query_routing_key() {
        let session = session(&FakeConnector::new()).await;

        let params = StatementParamsBuilder::new()
            .with_routing_key(&b"partition-7"[..])
            .build();
        let future = session.create_response_future(Query::new(
            Statement::Simple("SELECT * FROM ks.t".into()),
            params,
        ));

        assert_eq!(
            future.message.routing_key,
            Some(Bytes::from_static(b"partition-7"))
        );
    }

    #[tokio::test]
    async fn should_stamp_futures_from_custom_factory() {
        struct KeyedFactory;

        impl ResponseFutureFactory for KeyedFactory {
            fn create_future(&self, query: Query) -> ResponseFuture {
                let mut future = ResponseFuture::new(query);
                future.message.routing_key = Some(Bytes::from_static(b"stale"));
                future
            }
        }

        let config = ProxyConnectionConfigBuilder::new(proxy_host().into())
            .build()
            .await
            .unwrap();
        let session = ProxySessionBuilder::new(config, FakeConnector::new())
            .with_topology_tracker(tracker())
            .with_future_factory(Arc::new(KeyedFactory))
            .build()
            .await
            .unwrap();

        let future = session.create_response_future(Query::prepare("SELECT 1"));
        assert_eq!(future.message.routing_key, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn should_send_query_through_proxy() {
        let connector = FakeConnector::new();
        let session = session(&connector).await;

        let params = StatementParamsBuilder::new()
            .with_routing_key(&b"partition-7"[..])
            .build();
        session
            .query_with_params("SELECT * FROM ks.t WHERE id = 7", params)
            .await
            .unwrap();

        let frames = connector.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, Opcode::Query);
        assert_eq!(frames[0].version, Version::V4);
        assert_eq!(routing_key_of(&frames[0]), Some(&b"partition-7"[..]));
    }

    #[tokio::test]
    async fn should_report_unset_consistency_with_server_errors() {
        let connector = FakeConnector::with_responder(Arc::new(|request: &Frame| {
            Ok(error_response(request, ErrorBody::INVALID, "unconfigured table"))
        }));
        let session = session(&connector).await;

        let result = session.prepare("SELECT * FROM ks.missing").await;
        match result {
            Err(Error::Server {
                body,
                consistency,
                addr,
            }) => {
                assert_eq!(body.code, ErrorBody::INVALID);
                assert_eq!(body.message, "unconfigured table");
                assert_eq!(consistency, RequestConsistency::Unset);
                assert_eq!(addr, proxy_host());
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_report_query_consistency_with_server_errors() {
        let connector = FakeConnector::with_responder(Arc::new(|request: &Frame| {
            Ok(error_response(request, ErrorBody::UNAVAILABLE, "not enough replicas"))
        }));
        let config = ProxyConnectionConfigBuilder::new(proxy_host().into())
            .build()
            .await
            .unwrap();
        let session = ProxySessionBuilder::new(config, connector)
            .with_topology_tracker(tracker())
            .with_default_consistency(Consistency::LocalQuorum)
            .build()
            .await
            .unwrap();

        let result = session.query("SELECT * FROM ks.t").await;
        assert!(matches!(
            result,
            Err(Error::Server {
                consistency: RequestConsistency::Level(Consistency::LocalQuorum),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn should_return_prepared_id() {
        let connector = FakeConnector::with_responder(Arc::new(|request: &Frame| {
            // prepared result: kind, short bytes id, metadata left out
            let body = vec![0, 0, 0, 4, 0, 2, 0xAB, 0xCD];
            Ok(response_to(request, Opcode::Result, body))
        }));
        let session = session(&connector).await;

        let id = session.prepare("SELECT * FROM ks.t WHERE id = ?").await.unwrap();
        assert_eq!(id, vec![0xAB, 0xCD]);

        session.execute(id, Default::default()).await.unwrap();
        assert_eq!(connector.sent_frames()[1].opcode, Opcode::Execute);
    }
}
