//! Supervisory core for an embedded hub device.
//!
//! This library contains the monitor loops (power, network, reset button,
//! status LEDs), the shared device-health state they cooperate through, and
//! the [`supervisor::Supervisor`] that owns their lifecycle. Hardware access
//! goes through the capability traits in [`hardware`]; real GPIO/PWM/I2C and
//! network-management bindings are provided by the host process, mocks are
//! provided for tests and the demo binary.

pub mod config;
pub mod error;
pub mod hardware;
pub mod monitor;
pub mod state;
pub mod supervisor;
pub mod task;
