//! Mock capability implementations.
//!
//! Simulated hardware for testing the monitor loops without a device. All
//! mocks are cheaply cloneable handles over shared interior state, so a test
//! can keep a handle while the monitor owns another and flip inputs while
//! the loop runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    DigitalIo, HubProbe, Ipv4Config, Ipv4Properties, NetworkManager, PinDirection, PinPull,
    PowerStatus, Pwm, ServiceInfo, TechnologyInfo, VoltageSense,
};

// =============================================================================
// MockGpio
// =============================================================================

/// Digital I/O mock. Input pins read whatever the test last drove them to;
/// output writes are recorded and queryable.
#[derive(Clone, Default)]
pub struct MockGpio {
    levels: Arc<RwLock<HashMap<String, bool>>>,
    setups: Arc<RwLock<Vec<(String, PinDirection, PinPull)>>>,
    failing: Arc<RwLock<bool>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive an input pin from the test side.
    pub async fn set_level(&self, pin: &str, level: bool) {
        self.levels.write().await.insert(pin.to_string(), level);
    }

    /// When set, every read fails until cleared.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    /// Last written/driven level of a pin (false if untouched).
    pub async fn level(&self, pin: &str) -> bool {
        self.levels.read().await.get(pin).copied().unwrap_or(false)
    }

    /// Pins configured through `setup`.
    pub async fn setups(&self) -> Vec<(String, PinDirection, PinPull)> {
        self.setups.read().await.clone()
    }
}

#[async_trait]
impl DigitalIo for MockGpio {
    async fn setup(&self, pin: &str, direction: PinDirection, pull: PinPull) -> Result<()> {
        self.setups
            .write()
            .await
            .push((pin.to_string(), direction, pull));
        Ok(())
    }

    async fn read(&self, pin: &str) -> Result<bool> {
        if *self.failing.read().await {
            return Err(anyhow!("gpio read failed"));
        }
        Ok(self.level(pin).await)
    }

    async fn write(&self, pin: &str, level: bool) -> Result<()> {
        self.levels.write().await.insert(pin.to_string(), level);
        Ok(())
    }
}

// =============================================================================
// MockPwm
// =============================================================================

/// PWM mock recording the latest duty cycle per pin.
#[derive(Clone, Default)]
pub struct MockPwm {
    duty: Arc<RwLock<HashMap<String, f64>>>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest duty cycle on a pin, if the pin was ever driven.
    pub async fn duty(&self, pin: &str) -> Option<f64> {
        self.duty.read().await.get(pin).copied()
    }
}

#[async_trait]
impl Pwm for MockPwm {
    async fn start(&self, pin: &str, duty_percent: f64, _freq_hz: f64) -> Result<()> {
        self.duty.write().await.insert(pin.to_string(), duty_percent);
        Ok(())
    }

    async fn set_duty_cycle(&self, pin: &str, duty_percent: f64) -> Result<()> {
        self.duty.write().await.insert(pin.to_string(), duty_percent);
        Ok(())
    }
}

// =============================================================================
// MockPowerStatus
// =============================================================================

/// Power-management chip mock with settable status bits and optional
/// injected read failures.
#[derive(Clone, Default)]
pub struct MockPowerStatus {
    inner: Arc<RwLock<PowerStatusState>>,
}

#[derive(Default)]
struct PowerStatusState {
    on_battery: bool,
    charging: bool,
    battery_errors: bool,
    failing: bool,
}

impl MockPowerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_on_battery(&self, on_battery: bool) {
        self.inner.write().await.on_battery = on_battery;
    }

    pub async fn set_charging(&self, charging: bool) {
        self.inner.write().await.charging = charging;
    }

    pub async fn set_battery_errors(&self, errors: bool) {
        self.inner.write().await.battery_errors = errors;
    }

    /// When set, every query fails until cleared.
    pub async fn set_failing(&self, failing: bool) {
        self.inner.write().await.failing = failing;
    }

    async fn query<T>(&self, read: impl FnOnce(&PowerStatusState) -> T) -> Result<T> {
        let state = self.inner.read().await;
        if state.failing {
            return Err(anyhow!("i2c read failed"));
        }
        Ok(read(&state))
    }
}

#[async_trait]
impl PowerStatus for MockPowerStatus {
    async fn on_battery(&self) -> Result<bool> {
        self.query(|s| s.on_battery).await
    }

    async fn charging(&self) -> Result<bool> {
        self.query(|s| s.charging).await
    }

    async fn battery_errors(&self) -> Result<bool> {
        self.query(|s| s.battery_errors).await
    }
}

// =============================================================================
// MockVoltageSense
// =============================================================================

/// ADC mock. Unset channels read fully high (external power present).
#[derive(Clone, Default)]
pub struct MockVoltageSense {
    readings: Arc<RwLock<HashMap<String, f64>>>,
}

impl MockVoltageSense {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_reading(&self, pin: &str, value: f64) {
        self.readings.write().await.insert(pin.to_string(), value);
    }
}

#[async_trait]
impl VoltageSense for MockVoltageSense {
    async fn read(&self, pin: &str) -> Result<f64> {
        Ok(self.readings.read().await.get(pin).copied().unwrap_or(1.0))
    }
}

// =============================================================================
// MockNetworkManager
// =============================================================================

/// Network-management mock with a scripted service/technology inventory.
#[derive(Clone, Default)]
pub struct MockNetworkManager {
    inner: Arc<RwLock<NetworkState>>,
}

#[derive(Default)]
struct NetworkState {
    services: Vec<ServiceInfo>,
    technologies: Vec<TechnologyInfo>,
    connect_reports_already: bool,
    power_on_reports_already: bool,
    scans: u32,
    connects: Vec<String>,
    ipv4_configs: Vec<(String, Ipv4Config)>,
}

impl MockNetworkManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_services(&self, services: Vec<ServiceInfo>) {
        self.inner.write().await.services = services;
    }

    pub async fn set_technologies(&self, technologies: Vec<TechnologyInfo>) {
        self.inner.write().await.technologies = technologies;
    }

    /// Make `connect` fail with an "already connected" error.
    pub async fn set_connect_reports_already(&self, yes: bool) {
        self.inner.write().await.connect_reports_already = yes;
    }

    /// Make `power_on` fail with an "already enabled" error.
    pub async fn set_power_on_reports_already(&self, yes: bool) {
        self.inner.write().await.power_on_reports_already = yes;
    }

    pub async fn scan_count(&self) -> u32 {
        self.inner.read().await.scans
    }

    pub async fn connected_services(&self) -> Vec<String> {
        self.inner.read().await.connects.clone()
    }

    pub async fn applied_ipv4_configs(&self) -> Vec<(String, Ipv4Config)> {
        self.inner.read().await.ipv4_configs.clone()
    }

    /// Convenience: a wired eth0 service with the given address.
    pub fn wired_service(address: &str) -> ServiceInfo {
        ServiceInfo {
            path: "/net/service/ethernet_cafe".to_string(),
            name: Some("Wired".to_string()),
            interface: Some("eth0".to_string()),
            ipv4: Some(Ipv4Properties {
                address: Some(address.to_string()),
                method: Some("dhcp".to_string()),
            }),
        }
    }

    /// Convenience: a wifi service for the given SSID and address.
    pub fn wifi_service(ssid: &str, address: &str) -> ServiceInfo {
        ServiceInfo {
            path: format!("/net/service/wifi_{ssid}"),
            name: Some(ssid.to_string()),
            interface: Some("wlan0".to_string()),
            ipv4: Some(Ipv4Properties {
                address: Some(address.to_string()),
                method: Some("dhcp".to_string()),
            }),
        }
    }
}

#[async_trait]
impl NetworkManager for MockNetworkManager {
    async fn services(&self) -> Result<Vec<ServiceInfo>> {
        Ok(self.inner.read().await.services.clone())
    }

    async fn technologies(&self) -> Result<Vec<TechnologyInfo>> {
        Ok(self.inner.read().await.technologies.clone())
    }

    async fn power_on(&self, _technology_path: &str) -> Result<()> {
        if self.inner.read().await.power_on_reports_already {
            return Err(anyhow!("technology already enabled"));
        }
        Ok(())
    }

    async fn scan(&self, _technology_path: &str) -> Result<()> {
        self.inner.write().await.scans += 1;
        Ok(())
    }

    async fn connect(&self, service_path: &str) -> Result<()> {
        let mut state = self.inner.write().await;
        state.connects.push(service_path.to_string());
        if state.connect_reports_already {
            return Err(anyhow!("service already connected"));
        }
        Ok(())
    }

    async fn set_ipv4_config(&self, service_path: &str, config: &Ipv4Config) -> Result<()> {
        self.inner
            .write()
            .await
            .ipv4_configs
            .push((service_path.to_string(), config.clone()));
        Ok(())
    }
}

// =============================================================================
// MockHubProbe
// =============================================================================

/// Reachability probe mock: answers with a settable flag and counts probes.
#[derive(Clone, Default)]
pub struct MockHubProbe {
    inner: Arc<RwLock<ProbeState>>,
}

#[derive(Default)]
struct ProbeState {
    reachable: bool,
    probes: Vec<String>,
}

impl MockHubProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_reachable(&self, reachable: bool) {
        self.inner.write().await.reachable = reachable;
    }

    pub async fn probe_count(&self) -> usize {
        self.inner.read().await.probes.len()
    }

    pub async fn probed_urls(&self) -> Vec<String> {
        self.inner.read().await.probes.clone()
    }
}

#[async_trait]
impl HubProbe for MockHubProbe {
    async fn probe(&self, url: &str, _timeout: Duration) -> bool {
        let mut state = self.inner.write().await;
        state.probes.push(url.to_string());
        state.reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::pins;

    #[tokio::test]
    async fn gpio_round_trips_levels() {
        let gpio = MockGpio::new();
        gpio.setup(pins::TX_LED, PinDirection::Output, PinPull::None)
            .await
            .unwrap();
        gpio.write(pins::TX_LED, true).await.unwrap();
        assert!(gpio.read(pins::TX_LED).await.unwrap());
        assert_eq!(gpio.setups().await.len(), 1);

        gpio.set_failing(true).await;
        assert!(gpio.read(pins::TX_LED).await.is_err());
        gpio.set_failing(false).await;
        assert!(gpio.read(pins::TX_LED).await.unwrap());
    }

    #[tokio::test]
    async fn pwm_tracks_latest_duty() {
        let pwm = MockPwm::new();
        pwm.start(pins::GREEN_LED, 100.0, 1000.0).await.unwrap();
        pwm.set_duty_cycle(pins::GREEN_LED, 25.0).await.unwrap();
        assert_eq!(pwm.duty(pins::GREEN_LED).await, Some(25.0));
        assert_eq!(pwm.duty(pins::RED_LED).await, None);
    }

    #[tokio::test]
    async fn power_status_failure_injection() {
        let pmic = MockPowerStatus::new();
        pmic.set_on_battery(true).await;
        assert!(pmic.on_battery().await.unwrap());

        pmic.set_failing(true).await;
        assert!(pmic.on_battery().await.is_err());
        assert!(pmic.charging().await.is_err());

        pmic.set_failing(false).await;
        assert!(pmic.on_battery().await.unwrap());
    }

    #[tokio::test]
    async fn unset_adc_channel_reads_high() {
        let adc = MockVoltageSense::new();
        assert!(adc.read(pins::SYS_5V_SENSE).await.unwrap() > 0.9);
        adc.set_reading(pins::SYS_5V_SENSE, 0.1).await;
        assert!(adc.read(pins::SYS_5V_SENSE).await.unwrap() < 0.5);
    }

    #[tokio::test]
    async fn network_manager_records_activity() {
        let net = MockNetworkManager::new();
        net.set_services(vec![MockNetworkManager::wired_service("10.0.0.2")])
            .await;
        assert_eq!(net.services().await.unwrap().len(), 1);

        net.scan("/net/technology/wifi").await.unwrap();
        net.connect("/net/service/wifi_test").await.unwrap();
        assert_eq!(net.scan_count().await, 1);
        assert_eq!(net.connected_services().await.len(), 1);

        net.set_connect_reports_already(true).await;
        assert!(net.connect("/net/service/wifi_test").await.is_err());
    }

    #[tokio::test]
    async fn probe_counts_and_answers() {
        let probe = MockHubProbe::new();
        assert!(!probe.probe("http://10.0.0.2:8888", Duration::from_secs(5)).await);
        probe.set_reachable(true).await;
        assert!(probe.probe("http://10.0.0.2:8888", Duration::from_secs(5)).await);
        assert_eq!(probe.probe_count().await, 2);
    }
}
