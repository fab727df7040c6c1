use bytemuck::NoUninit;
use derive_more::Display;

/// The state of the proxy host, as viewed from the driver.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, NoUninit)]
#[repr(u8)]
pub enum NodeState {
    /// Nothing has been reported about the host yet.
    Unknown,
    /// The host was reachable the last time it was probed.
    Up,
    /// A connection reported the host as unreachable and a reconnection loop is running.
    Down,
    /// The reconnection schedule gave up on the host.
    ForcedDown,
}
