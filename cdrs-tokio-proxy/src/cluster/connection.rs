use arc_swap::ArcSwapOption;
use atomic::Atomic;
use bytemuck::NoUninit;
use cassandra_proxy_protocol::frame::message_proxied::ProxiedMessage;
use cassandra_proxy_protocol::frame::message_request::RequestMessage;
use cassandra_proxy_protocol::frame::Flags;
use derive_more::Display;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::*;

use crate::cluster::topology::{HostEvent, TopologyTracker};
use crate::cluster::ProxyConnectionConfig;
use crate::error::{Error, Result};
use crate::transport::{PendingResponse, ProxyTransport, TransportConnector};

/// Lifecycle of a proxy connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, NoUninit)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Closing,
    Closed,
}

/// A connection to a multiplexing proxy.
///
/// Every outgoing message is wrapped in a proxied envelope carrying its routing key, and no
/// OPTIONS/STARTUP handshake is performed - the proxy negotiates with the backend on its own.
///
/// Closing the connection always tries to reconnect right away. If the proxy cannot be reached,
/// the connection stays closed and the proxy host is reported down to the topology tracker, which
/// then owns backing off.
pub struct ProxyConnection<C: TransportConnector + 'static> {
    inner: Arc<ConnectionInner<C>>,
    host_events_handle: Option<JoinHandle<()>>,
}

impl<C: TransportConnector + 'static> Drop for ProxyConnection<C> {
    fn drop(&mut self) {
        if let Some(handle) = &self.host_events_handle {
            handle.abort();
        }

        if let Some(transport) = self.inner.transport.swap(None) {
            transport.close();
        }
    }
}

impl<C: TransportConnector + 'static> ProxyConnection<C> {
    /// Normalizes the message and sends it wrapped in a proxied envelope. A missing consistency
    /// is set to `RequestConsistency::Unset` on the message itself, a missing routing key is sent
    /// as an empty one.
    pub async fn send(&self, message: &mut RequestMessage) -> Result<PendingResponse> {
        let state = self.state();
        if state != ConnectionState::Ready {
            return Err(Error::General(format!(
                "Connection to proxy {} is not ready: {state}",
                self.address()
            )));
        }

        let transport = self.inner.transport.load_full().ok_or_else(|| {
            Error::General(format!("No transport to proxy {}!", self.address()))
        })?;

        let frame =
            ProxiedMessage::wrap(message).into_frame(self.inner.config.version(), Flags::empty());

        transport.enqueue_frame(&frame).await
    }

    /// Tears the socket down and immediately reconnects to the same address. A reconnection
    /// failing with a connection error leaves the connection closed and reports the proxy host
    /// down to the topology tracker. Never fails.
    pub async fn close(&self) {
        self.inner.close().await
    }

    /// Brings a closed connection back. Does nothing if the connection is ready.
    pub async fn reconnect(&self) -> Result<()> {
        self.inner.reconnect().await
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.load(Ordering::Relaxed)
    }

    /// Address of the proxy.
    #[inline]
    pub fn address(&self) -> SocketAddr {
        self.inner.config.addr()
    }

    #[inline]
    pub fn config(&self) -> &ProxyConnectionConfig {
        &self.inner.config
    }
}

struct ConnectionInner<C: TransportConnector + 'static> {
    config: ProxyConnectionConfig,
    connector: C,
    tracker: Arc<dyn TopologyTracker>,
    state: Atomic<ConnectionState>,
    transport: ArcSwapOption<C::Transport>,
    reconnect_lock: Mutex<()>,
}

impl<C: TransportConnector + 'static> ConnectionInner<C> {
    #[inline]
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state, Ordering::Relaxed);
    }

    async fn close(self: &Arc<Self>) {
        let _guard = self.reconnect_lock.lock().await;

        let addr = self.config.addr();
        debug!(?addr, "Closing proxy connection.");

        self.set_state(ConnectionState::Closing);
        if let Some(transport) = self.transport.swap(None) {
            transport.close();
        }

        // errors are handled by reporting to the tracker
        let _ = self.try_reconnect().await;
    }

    async fn reconnect(self: &Arc<Self>) -> Result<()> {
        let _guard = self.reconnect_lock.lock().await;

        let state = self.state.load(Ordering::Relaxed);
        if state == ConnectionState::Ready {
            return Ok(());
        }

        debug!(addr = ?self.config.addr(), %state, "Reconnecting proxy connection.");
        self.try_reconnect().await
    }

    async fn try_reconnect(self: &Arc<Self>) -> Result<()> {
        let addr = self.config.addr();

        match self.connect().await {
            Ok(()) => {
                debug!(?addr, "Reconnected to proxy.");
                Ok(())
            }
            Err(error) => {
                self.set_state(ConnectionState::Closed);

                if error.is_connection_error() {
                    warn!(%error, ?addr, "Cannot reconnect to proxy. Reporting host down.");
                    self.tracker
                        .report_host_down(self.tracker.proxy_host(), false, true);
                } else {
                    error!(%error, ?addr, "Error reconnecting to proxy!");
                }

                Err(error)
            }
        }
    }

    /// Opens a new socket. The proxy answers capability and startup requests itself, so the
    /// connection is ready as soon as the socket is.
    async fn connect(self: &Arc<Self>) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let (error_sender, error_receiver) = mpsc::channel(1);
        let transport = Arc::new(
            self.connector
                .connect(self.config.addr(), Some(error_sender))
                .await?,
        );

        Self::monitor_transport(
            Arc::downgrade(self),
            Arc::downgrade(&transport),
            error_receiver,
        );

        self.transport.store(Some(transport));
        self.set_state(ConnectionState::Ready);

        Ok(())
    }

    fn is_current(&self, transport: &Weak<C::Transport>) -> bool {
        self.transport
            .load()
            .as_ref()
            .map(|current| std::ptr::eq(Arc::as_ptr(current), transport.as_ptr()))
            .unwrap_or(false)
    }

    /// Runs the close path when the transport reports a read or write failure.
    fn monitor_transport(
        connection: Weak<Self>,
        transport: Weak<C::Transport>,
        mut error_receiver: mpsc::Receiver<Error>,
    ) {
        tokio::spawn(async move {
            if let Some(error) = error_receiver.recv().await {
                let Some(connection) = connection.upgrade() else {
                    return;
                };

                if !connection.is_current(&transport) {
                    debug!(%error, "Ignoring error from a replaced transport.");
                    return;
                }

                warn!(%error, addr = ?connection.config.addr(), "Proxy connection broken.");
                connection.close().await;
            }
        });
    }

    /// Reconnects a closed connection when the tracker announces the proxy host again.
    fn listen_for_host_events(
        connection: Weak<Self>,
        mut host_events: broadcast::Receiver<HostEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = match host_events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed host events.");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(connection) = connection.upgrade() else {
                    break;
                };

                if event.host() != connection.config.addr()
                    || connection.state.load(Ordering::Relaxed) != ConnectionState::Closed
                {
                    continue;
                }

                if let Err(error) = connection.reconnect().await {
                    debug!(%error, %event, "Cannot reconnect after host event.");
                }
            }
        })
    }
}

/// Builder for [`ProxyConnection`]. A topology tracker is mandatory.
pub struct ProxyConnectionBuilder<C: TransportConnector + 'static> {
    config: ProxyConnectionConfig,
    connector: C,
    tracker: Option<Arc<dyn TopologyTracker>>,
    host_events: Option<broadcast::Receiver<HostEvent>>,
}

impl<C: TransportConnector + 'static> ProxyConnectionBuilder<C> {
    pub fn new(config: ProxyConnectionConfig, connector: C) -> Self {
        ProxyConnectionBuilder {
            config,
            connector,
            tracker: None,
            host_events: None,
        }
    }

    /// Sets the tracker notified when the proxy cannot be reached.
    pub fn with_topology_tracker(mut self, tracker: Arc<dyn TopologyTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the source of host events used to bring a closed connection back.
    pub fn with_host_events(mut self, host_events: broadcast::Receiver<HostEvent>) -> Self {
        self.host_events = Some(host_events);
        self
    }

    /// Connects to the proxy.
    pub async fn build(self) -> Result<ProxyConnection<C>> {
        let tracker = self.tracker.ok_or_else(|| {
            Error::Configuration("Proxy connection requires a topology tracker!".into())
        })?;

        let inner = Arc::new(ConnectionInner {
            config: self.config,
            connector: self.connector,
            tracker,
            state: Atomic::new(ConnectionState::Connecting),
            transport: ArcSwapOption::empty(),
            reconnect_lock: Mutex::new(()),
        });

        inner.connect().await?;

        let host_events_handle = self.host_events.map(|host_events| {
            ConnectionInner::listen_for_host_events(Arc::downgrade(&inner), host_events)
        });

        Ok(ProxyConnection {
            inner,
            host_events_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cassandra_proxy_protocol::consistency::{Consistency, RequestConsistency};
    use cassandra_proxy_protocol::frame::message_prepare::BodyReqPrepare;
    use cassandra_proxy_protocol::frame::message_query::BodyReqQuery;
    use cassandra_proxy_protocol::frame::message_request::{RequestBody, RequestMessage};
    use cassandra_proxy_protocol::frame::message_proxied::routing_key_of;
    use cassandra_proxy_protocol::frame::{Flags, Opcode};
    use cassandra_proxy_protocol::query::QueryParams;
    use mockall::predicate::eq;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    use super::{ConnectionState, ProxyConnection, ProxyConnectionBuilder};
    use crate::cluster::topology::{HostEvent, MockTopologyTracker};
    use crate::cluster::{ProxyConnectionConfig, ProxyConnectionConfigBuilder};
    use crate::transport::test_support::FakeConnector;
    use crate::Error;

    fn proxy_host() -> SocketAddr {
        "127.0.0.1:9042".parse().unwrap()
    }

    async fn config() -> ProxyConnectionConfig {
        ProxyConnectionConfigBuilder::new(proxy_host().into())
            .build()
            .await
            .unwrap()
    }

    fn silent_tracker() -> MockTopologyTracker {
        let mut tracker = MockTopologyTracker::new();
        tracker.expect_proxy_host().return_const(proxy_host());
        tracker.expect_report_host_down().never();
        tracker
    }

    async fn connection(
        connector: &FakeConnector,
        tracker: MockTopologyTracker,
    ) -> ProxyConnection<FakeConnector> {
        ProxyConnectionBuilder::new(config().await, connector.clone())
            .with_topology_tracker(Arc::new(tracker))
            .build()
            .await
            .unwrap()
    }

    fn prepare_message() -> RequestMessage {
        RequestMessage::new(RequestBody::Prepare(BodyReqPrepare::new(
            "SELECT * FROM ks.t WHERE id = ?".into(),
        )))
    }

    #[tokio::test]
    async fn should_require_topology_tracker() {
        let result = ProxyConnectionBuilder::new(config().await, FakeConnector::new())
            .build()
            .await;

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn should_be_ready_without_handshake() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        assert_eq!(connection.state(), ConnectionState::Ready);
        assert_eq!(connector.connects(), 1);
        assert!(connector.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn should_default_missing_fields_when_sending() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        let mut message = prepare_message();
        assert_eq!(message.consistency, None);

        connection
            .send(&mut message)
            .await
            .unwrap()
            .response()
            .await
            .unwrap();

        assert_eq!(message.consistency, Some(RequestConsistency::Unset));

        let frames = connector.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, Opcode::Prepare);
        assert!(frames[0].flags.contains(Flags::CUSTOM_PAYLOAD));
        assert_eq!(routing_key_of(&frames[0]), Some(&b""[..]));
    }

    #[tokio::test]
    async fn should_send_routing_key() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        let mut message = RequestMessage::new(RequestBody::Query(BodyReqQuery {
            query: "SELECT * FROM ks.t WHERE id = 7".into(),
            query_params: QueryParams {
                consistency: Consistency::Quorum,
                ..Default::default()
            },
        }))
        .with_routing_key(Bytes::from_static(b"partition-7"));

        connection.send(&mut message).await.unwrap();

        assert_eq!(
            message.consistency,
            Some(RequestConsistency::Level(Consistency::Quorum))
        );
        assert_eq!(
            routing_key_of(&connector.sent_frames()[0]),
            Some(&b"partition-7"[..])
        );
    }

    #[tokio::test]
    async fn should_reconnect_on_close_without_reporting() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        connection.close().await;

        assert_eq!(connection.state(), ConnectionState::Ready);
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 1);

        connection.send(&mut prepare_message()).await.unwrap();
    }

    #[tokio::test]
    async fn should_report_host_down_when_reconnection_fails() {
        let connector = FakeConnector::new();

        let mut tracker = MockTopologyTracker::new();
        tracker.expect_proxy_host().return_const(proxy_host());
        tracker
            .expect_report_host_down()
            .with(eq(proxy_host()), eq(false), eq(true))
            .times(1)
            .return_const(());

        let connection = connection(&connector, tracker).await;

        connector.fail_next(io::ErrorKind::ConnectionRefused);
        connection.close().await;

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.send(&mut prepare_message()).await.is_err());
    }

    #[tokio::test]
    async fn should_not_report_other_reconnection_errors() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        connector.fail_next(io::ErrorKind::PermissionDenied);
        connection.close().await;

        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn should_reconnect_closed_connection() {
        let connector = FakeConnector::new();

        let mut tracker = MockTopologyTracker::new();
        tracker.expect_proxy_host().return_const(proxy_host());
        tracker.expect_report_host_down().times(1).return_const(());

        let connection = connection(&connector, tracker).await;

        connector.fail_next(io::ErrorKind::ConnectionReset);
        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);

        connection.reconnect().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Ready);

        // ready connections stay untouched
        connection.reconnect().await.unwrap();
        assert_eq!(connector.connects(), 3);
    }

    #[tokio::test]
    async fn should_run_close_path_when_proxy_hangs_up() {
        let connector = FakeConnector::new();
        let connection = connection(&connector, silent_tracker()).await;

        connector.hang_up().await;

        for _ in 0..200 {
            if connector.connects() == 2 && connection.state() == ConnectionState::Ready {
                break;
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 1);
        assert_eq!(connection.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn should_reconnect_when_host_comes_back() {
        let connector = FakeConnector::new();

        let mut tracker = MockTopologyTracker::new();
        tracker.expect_proxy_host().return_const(proxy_host());
        tracker.expect_report_host_down().times(1).return_const(());

        let (event_sender, event_receiver) = broadcast::channel(4);

        let connection = ProxyConnectionBuilder::new(config().await, connector.clone())
            .with_topology_tracker(Arc::new(tracker))
            .with_host_events(event_receiver)
            .build()
            .await
            .unwrap();

        connector.fail_next(io::ErrorKind::ConnectionRefused);
        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);

        event_sender.send(HostEvent::Up(proxy_host())).unwrap();

        for _ in 0..200 {
            if connection.state() == ConnectionState::Ready {
                break;
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(connection.state(), ConnectionState::Ready);
    }
}
