//! Hardware capability interfaces.
//!
//! The supervisor core never touches GPIO registers, the I2C bus, or the
//! network-management daemon directly; it calls through the trait objects
//! defined here. The host process supplies real implementations, tests and
//! the demo binary use the mocks in [`mock`].

pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Board pin assignments for the hub's GPIO peripherals.
pub mod pins {
    /// RS-485 driver enable.
    pub const DRIVER_ENABLE: &str = "P9_30";
    /// RS-485 receiver enable (active low).
    pub const RECEIVER_ENABLE: &str = "P9_27";
    /// Transmit activity indicator.
    pub const TX_LED: &str = "P9_23";
    /// Receive activity indicator.
    pub const RX_LED: &str = "P9_15";
    /// Board status indicator.
    pub const STATUS_LED: &str = "P9_12";

    /// RGB status LED, PWM-driven.
    pub const RED_LED: &str = "P9_14";
    pub const GREEN_LED: &str = "P9_16";
    pub const BLUE_LED: &str = "P8_19";

    /// Factory-reset push button.
    pub const FACTORY_RESET: &str = "P8_7";

    /// ADC channel sensing the system 5V rail.
    pub const SYS_5V_SENSE: &str = "P9_39";
}

/// Direction of a digital I/O pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Pull resistor configuration for an input pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PinPull {
    #[default]
    None,
    Up,
    Down,
}

/// Digital I/O capability.
#[async_trait]
pub trait DigitalIo: Send + Sync {
    async fn setup(&self, pin: &str, direction: PinDirection, pull: PinPull) -> Result<()>;
    async fn read(&self, pin: &str) -> Result<bool>;
    async fn write(&self, pin: &str, level: bool) -> Result<()>;
}

/// PWM output capability. Duty cycles are percentages in 0..=100.
#[async_trait]
pub trait Pwm: Send + Sync {
    async fn start(&self, pin: &str, duty_percent: f64, freq_hz: f64) -> Result<()>;
    async fn set_duty_cycle(&self, pin: &str, duty_percent: f64) -> Result<()>;
}

/// Derived power-management chip queries. Register-level access and decoding
/// stay inside the hardware layer; the core only consumes these three.
#[async_trait]
pub trait PowerStatus: Send + Sync {
    /// Device is drawing from battery (no AC and no USB supply).
    async fn on_battery(&self) -> Result<bool>;
    /// Charger is actively charging the battery.
    async fn charging(&self) -> Result<bool>;
    /// Charge timeout, precharge timeout or battery temperature fault.
    async fn battery_errors(&self) -> Result<bool>;
}

/// Analog sense capability. Readings are raw, 0.0..=1.0.
#[async_trait]
pub trait VoltageSense: Send + Sync {
    async fn read(&self, pin: &str) -> Result<f64>;
}

/// IPv4 properties decoded from a network service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Properties {
    pub address: Option<String>,
    pub method: Option<String>,
}

/// One discovered network service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Opaque handle used for connect/configure calls.
    pub path: String,
    /// Advertised name (the SSID for wifi services).
    pub name: Option<String>,
    /// Kernel interface name ("eth0", "wlan0", ...).
    pub interface: Option<String>,
    pub ipv4: Option<Ipv4Properties>,
}

/// One discovered network technology (wifi, ethernet, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TechnologyInfo {
    pub path: String,
    pub name: String,
}

/// IPv4 configuration applied to a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ipv4Config {
    Dhcp,
    Manual {
        address: String,
        netmask: String,
        gateway: String,
    },
}

/// Network-management capability (connman-style daemon behind DBus).
///
/// `power_on` and `connect` may fail with "already enabled" / "already
/// connected" style errors on repeat calls; callers treat those as success.
#[async_trait]
pub trait NetworkManager: Send + Sync {
    async fn services(&self) -> Result<Vec<ServiceInfo>>;
    async fn technologies(&self) -> Result<Vec<TechnologyInfo>>;
    async fn power_on(&self, technology_path: &str) -> Result<()>;
    async fn scan(&self, technology_path: &str) -> Result<()>;
    async fn connect(&self, service_path: &str) -> Result<()>;
    async fn set_ipv4_config(&self, service_path: &str, config: &Ipv4Config) -> Result<()>;
}

/// HTTP reachability probe: a plain GET against the hub endpoint.
#[async_trait]
pub trait HubProbe: Send + Sync {
    /// Returns true when the endpoint answered within `timeout`.
    async fn probe(&self, url: &str, timeout: Duration) -> bool;
}
