//! Shared device-health state.
//!
//! A single [`DeviceHealthState`] record is owned by the supervisor and
//! shared with every monitor behind `Arc<RwLock<..>>`. Monitors mutate only
//! their own fields; the status indicator reads one locked snapshot so its
//! derived LED state never mixes fields from different instants.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Derived display state rendered on the RGB status LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedState {
    /// Hub reachable, no fault.
    NormalConnected,
    /// Running, but the hub endpoint is unreachable.
    NoHub,
    /// Battery fault or shutdown countdown expired.
    Error,
}

/// Process-wide mutable record shared by all monitors.
#[derive(Debug)]
pub struct DeviceHealthState {
    /// Last-observed power source.
    pub on_battery: bool,
    /// Last-observed battery charge status.
    pub charging: bool,
    /// Battery fault bits reported by the power-management chip.
    pub battery_errors: bool,
    /// Elapsed time since the most recent switch onto battery power.
    pub time_on_battery: Duration,
    /// Set once `time_on_battery` exceeds the shutdown threshold. One-way:
    /// never cleared except by a full restart.
    pub shutdown_elapsed: bool,

    /// Last resolved reachability of the hub endpoint.
    pub network_connected: bool,
    /// Last resolved IPv4 address of the preferred interface.
    pub ip_address: Option<String>,
    /// Consecutive failed reconnection attempts; >= 1, reset to 1 only on a
    /// successful reconnect.
    pub connection_attempts: u32,

    /// Reset button currently held.
    pub reset_held: bool,
    /// Instant the current hold began, while held.
    pub reset_hold_start: Option<Instant>,

    /// Derived display state.
    pub led_state: LedState,

    /// Most recent observed transmit activity.
    pub last_tx: Option<Instant>,
    /// Most recent observed receive activity.
    pub last_rx: Option<Instant>,
}

impl Default for DeviceHealthState {
    fn default() -> Self {
        Self {
            on_battery: false,
            charging: false,
            battery_errors: false,
            time_on_battery: Duration::ZERO,
            shutdown_elapsed: false,
            network_connected: false,
            ip_address: None,
            connection_attempts: 1,
            reset_held: false,
            reset_hold_start: None,
            led_state: LedState::NoHub,
            last_tx: None,
            last_rx: None,
        }
    }
}

impl DeviceHealthState {
    /// Derive the LED state from the current snapshot.
    pub fn derive_led_state(&self) -> LedState {
        if self.shutdown_elapsed || self.battery_errors {
            LedState::Error
        } else if self.network_connected {
            LedState::NormalConnected
        } else {
            LedState::NoHub
        }
    }
}

/// Handle monitors hold onto the shared record.
pub type SharedState = Arc<RwLock<DeviceHealthState>>;

/// New shared state with default contents.
pub fn shared_state() -> SharedState {
    Arc::new(RwLock::new(DeviceHealthState::default()))
}

/// Stamp a transmit event; keeps the tx activity LED lit for its window.
pub async fn note_tx_activity(state: &SharedState) {
    state.write().await.last_tx = Some(Instant::now());
}

/// Stamp a receive event; keeps the rx activity LED lit for its window.
pub async fn note_rx_activity(state: &SharedState) {
    state.write().await.last_rx = Some(Instant::now());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_starts_disconnected() {
        let state = DeviceHealthState::default();
        assert!(!state.on_battery);
        assert!(!state.shutdown_elapsed);
        assert_eq!(state.connection_attempts, 1);
        assert_eq!(state.led_state, LedState::NoHub);
    }

    #[test]
    fn led_state_error_wins_over_connectivity() {
        let state = DeviceHealthState {
            shutdown_elapsed: true,
            network_connected: true,
            ..Default::default()
        };
        assert_eq!(state.derive_led_state(), LedState::Error);
    }

    #[test]
    fn led_state_follows_hub_reachability() {
        let mut state = DeviceHealthState::default();
        assert_eq!(state.derive_led_state(), LedState::NoHub);
        state.network_connected = true;
        assert_eq!(state.derive_led_state(), LedState::NormalConnected);
        state.battery_errors = true;
        assert_eq!(state.derive_led_state(), LedState::Error);
    }
}
