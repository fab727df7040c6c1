use atomic::Atomic;
use bytemuck::NoUninit;
use derive_more::Display;
#[cfg(test)]
use mockall::automock;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::*;

use crate::cluster::topology::NodeState;
use crate::retry::{ReconnectionPolicy, ReconnectionSchedule};
use crate::transport::{ProxyTransport, TransportConnector};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Cluster membership view used by proxy connections to report a host which cannot be reached.
#[cfg_attr(test, automock)]
pub trait TopologyTracker: Send + Sync {
    /// Address of the proxy endpoint all connections talk to.
    fn proxy_host(&self) -> SocketAddr;

    /// Reports a host as down. `is_host_addition` marks reports about hosts which are just being
    /// added, `expect_host_to_be_down` marks downs caused by the driver itself (e.g. after
    /// closing a connection).
    fn report_host_down(
        &self,
        host: SocketAddr,
        is_host_addition: bool,
        expect_host_to_be_down: bool,
    );
}

/// Host availability change announced by the tracker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum HostEvent {
    #[display("Up({_0})")]
    Up(SocketAddr),
    #[display("Added({_0})")]
    Added(SocketAddr),
}

impl HostEvent {
    #[inline]
    pub fn host(&self) -> SocketAddr {
        match self {
            HostEvent::Up(host) | HostEvent::Added(host) => *host,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, NoUninit)]
#[repr(u8)]
enum ReconnectionState {
    NotRunning,
    InProgress,
    Disabled,
}

/// Tracks the state of a single proxy host. A down report starts a reconnection loop driven by
/// the reconnection policy; the loop probes the host with the transport connector and announces
/// the host through [`HostEvent`]s once it is reachable again.
pub struct ProxyTopologyTracker<C: TransportConnector + 'static> {
    proxy_host: SocketAddr,
    connector: Arc<C>,
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    state: Arc<Atomic<NodeState>>,
    reconnection_state: Arc<Atomic<ReconnectionState>>,
    event_sender: broadcast::Sender<HostEvent>,
}

impl<C: TransportConnector + 'static> ProxyTopologyTracker<C> {
    pub fn new(
        proxy_host: SocketAddr,
        connector: C,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        ProxyTopologyTracker {
            proxy_host,
            connector: Arc::new(connector),
            reconnection_policy,
            state: Arc::new(Atomic::new(NodeState::Unknown)),
            reconnection_state: Arc::new(Atomic::new(ReconnectionState::NotRunning)),
            event_sender,
        }
    }

    /// Current state of the proxy host.
    #[inline]
    pub fn state(&self) -> NodeState {
        self.state.load(Ordering::Relaxed)
    }

    /// Creates a new receiver of host events.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.event_sender.subscribe()
    }

    fn start_reconnection(&self, host: SocketAddr, is_host_addition: bool) {
        let schedule = self.reconnection_policy.new_host_schedule();
        let connector = self.connector.clone();
        let state = self.state.clone();
        let reconnection_state = self.reconnection_state.clone();
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            let new_state = Self::run_reconnection_loop(schedule, connector.as_ref(), host).await;

            debug!(?host, %new_state, "Reconnection loop stopped.");

            if new_state == ReconnectionState::Disabled {
                warn!(
                    ?host,
                    "Forcing proxy host down, since no connection can be established."
                );
                state.store(NodeState::ForcedDown, Ordering::Relaxed);
                reconnection_state.store(new_state, Ordering::Release);
                return;
            }

            state.store(NodeState::Up, Ordering::Relaxed);

            // listeners may report the host down again as soon as they see the event
            reconnection_state.store(new_state, Ordering::Release);

            let event = if is_host_addition {
                HostEvent::Added(host)
            } else {
                HostEvent::Up(host)
            };

            info!(?host, %event, "Proxy host is reachable again.");

            // nobody might be listening
            let _ = event_sender.send(event);
        });
    }

    async fn run_reconnection_loop(
        mut schedule: Box<dyn ReconnectionSchedule + Send + Sync>,
        connector: &C,
        host: SocketAddr,
    ) -> ReconnectionState {
        while let Some(delay) = schedule.next_delay() {
            sleep(delay).await;

            match connector.connect(host, None).await {
                Ok(transport) => {
                    transport.close();
                    return ReconnectionState::NotRunning;
                }
                Err(error) => {
                    debug!(%error, ?host, "Proxy host still unreachable.");
                }
            }
        }

        // the policy doesn't want to reconnect to this host
        ReconnectionState::Disabled
    }
}

impl<C: TransportConnector + 'static> TopologyTracker for ProxyTopologyTracker<C> {
    #[inline]
    fn proxy_host(&self) -> SocketAddr {
        self.proxy_host
    }

    fn report_host_down(
        &self,
        host: SocketAddr,
        is_host_addition: bool,
        expect_host_to_be_down: bool,
    ) {
        if host != self.proxy_host {
            debug!(?host, proxy_host = ?self.proxy_host, "Ignoring report about unknown host.");
            return;
        }

        // all connections to the proxy go down together, so protect against many reconnection
        // loops; a forced down host comes back only when it's being added again
        let expected_state = if is_host_addition
            && self.reconnection_state.load(Ordering::Relaxed) == ReconnectionState::Disabled
        {
            ReconnectionState::Disabled
        } else {
            ReconnectionState::NotRunning
        };

        if self
            .reconnection_state
            .compare_exchange(
                expected_state,
                ReconnectionState::InProgress,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            debug!(?host, "Host already being reconnected or forced down.");
            return;
        }

        if expect_host_to_be_down {
            info!(?host, is_host_addition, "Proxy host down. Starting reconnection.");
        } else {
            warn!(
                ?host,
                is_host_addition,
                "Proxy host unexpectedly down. Starting reconnection."
            );
        }

        self.state.store(NodeState::Down, Ordering::Relaxed);
        self.start_reconnection(host, is_host_addition);
    }
}
