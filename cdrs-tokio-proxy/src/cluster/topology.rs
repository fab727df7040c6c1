mod node_state;
mod tracker;

pub use self::node_state::NodeState;
#[cfg(test)]
pub use self::tracker::MockTopologyTracker;
pub use self::tracker::{HostEvent, ProxyTopologyTracker, TopologyTracker};
