mod reconnection_policy;

pub use crate::retry::reconnection_policy::{
    ConstantReconnectionPolicy, ExponentialReconnectionPolicy, NeverReconnectionPolicy,
    ReconnectionPolicy, ReconnectionSchedule,
};

#[cfg(test)]
pub use crate::retry::reconnection_policy::MockReconnectionPolicy;
