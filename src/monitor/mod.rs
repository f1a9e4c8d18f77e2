//! Monitor loops.
//!
//! Each monitor runs as an independent tokio task, reads hardware through
//! its capability handles, records what it observed in the shared
//! [`DeviceHealthState`](crate::state::DeviceHealthState), and stops
//! cooperatively through a [`StopToken`](crate::task::StopToken).

pub mod network;
pub mod power;
pub mod reset;
pub mod status;

pub use network::{NetworkMonitor, NetworkMonitorConfig};
pub use power::{PowerMonitor, PowerMonitorConfig};
pub use reset::{ResetOutcome, ResetWatcher, ResetWatcherConfig};
pub use status::StatusIndicator;
