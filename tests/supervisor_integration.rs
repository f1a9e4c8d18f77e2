//! End-to-end supervisor tests over mock hardware.

use hub_supervisor::config::Settings;
use hub_supervisor::hardware::mock::{
    MockGpio, MockHubProbe, MockNetworkManager, MockPowerStatus, MockPwm, MockVoltageSense,
};
use hub_supervisor::hardware::pins;
use hub_supervisor::monitor::PowerMonitorConfig;
use hub_supervisor::state::LedState;
use hub_supervisor::supervisor::{Capabilities, Supervisor, SupervisorConfig};
use std::sync::Arc;
use std::time::Duration;

struct Bench {
    gpio: MockGpio,
    pwm: MockPwm,
    pmic: MockPowerStatus,
    adc: MockVoltageSense,
    net: MockNetworkManager,
    probe: MockHubProbe,
}

impl Bench {
    fn new() -> Self {
        Self {
            gpio: MockGpio::new(),
            pwm: MockPwm::new(),
            pmic: MockPowerStatus::new(),
            adc: MockVoltageSense::new(),
            net: MockNetworkManager::new(),
            probe: MockHubProbe::new(),
        }
    }

    async fn with_reachable_hub(self) -> Self {
        self.net
            .set_services(vec![MockNetworkManager::wired_service("10.0.0.2")])
            .await;
        self.probe.set_reachable(true).await;
        self
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            gpio: Arc::new(self.gpio.clone()),
            pwm: Arc::new(self.pwm.clone()),
            pmic: Arc::new(self.pmic.clone()),
            adc: Arc::new(self.adc.clone()),
            net: Arc::new(self.net.clone()),
            probe: Arc::new(self.probe.clone()),
        }
    }

    fn supervisor(&self) -> Supervisor {
        Supervisor::new(
            self.capabilities(),
            Settings::defaults(),
            SupervisorConfig::default(),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn healthy_device_settles_into_green_connected_state() {
    let bench = Bench::new().with_reachable_hub().await;
    let running = bench.supervisor().start().await;
    let state = running.state();

    tokio::time::sleep(Duration::from_secs(5)).await;
    {
        let state = state.read().await;
        assert!(state.network_connected);
        assert_eq!(state.ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(state.led_state, LedState::NormalConnected);
        assert_eq!(state.connection_attempts, 1);
    }
    assert_eq!(bench.pwm.duty(pins::GREEN_LED).await, Some(100.0));

    running.request_stop();
    let outcome = running.wait().await;
    assert!(!outcome.shutdown_elapsed);
    assert!(!outcome.reset_requested);
}

#[tokio::test(start_paused = true)]
async fn power_loss_drives_countdown_then_shutdown_outcome() {
    let bench = Bench::new().with_reachable_hub().await;
    let config = SupervisorConfig {
        power: PowerMonitorConfig {
            shutdown_threshold: Duration::from_secs(10),
            ..Default::default()
        },
        ..Default::default()
    };
    let running = Supervisor::new(bench.capabilities(), Settings::defaults(), config)
        .start()
        .await;
    let state = running.state();

    // Healthy for a minute, then the supply drops.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!state.read().await.on_battery);
    bench.pmic.set_on_battery(true).await;

    let outcome = running.wait().await;
    assert!(outcome.shutdown_elapsed);
    assert!(!outcome.factory_reset_requested);
    let state = state.read().await;
    assert!(state.shutdown_elapsed);
    assert!(state.time_on_battery > Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn short_reset_press_resolves_soft_reset() {
    let bench = Bench::new().with_reachable_hub().await;
    let running = bench.supervisor().start().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    bench.gpio.set_level(pins::FACTORY_RESET, true).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    bench.gpio.set_level(pins::FACTORY_RESET, false).await;

    let outcome = running.wait().await;
    assert!(outcome.reset_requested);
    assert!(!outcome.factory_reset_requested);
    assert!(!outcome.shutdown_elapsed);
}

#[tokio::test(start_paused = true)]
async fn unreachable_hub_shows_no_hub_and_counts_attempts() {
    let bench = Bench::new();
    bench
        .net
        .set_services(vec![MockNetworkManager::wired_service("10.0.0.2")])
        .await;
    // Probe never answers.

    let running = bench.supervisor().start().await;
    let state = running.state();

    tokio::time::sleep(Duration::from_secs(45)).await;
    {
        let state = state.read().await;
        assert!(!state.network_connected);
        assert_eq!(state.led_state, LedState::NoHub);
        assert!(state.connection_attempts > 1);
    }
    assert_eq!(bench.pwm.duty(pins::BLUE_LED).await, Some(100.0));

    // Hub comes back: reconnect resets the attempt counter.
    bench.probe.set_reachable(true).await;
    tokio::time::sleep(Duration::from_secs(15)).await;
    {
        let state = state.read().await;
        assert!(state.network_connected);
        assert_eq!(state.connection_attempts, 1);
    }

    running.request_stop();
    running.wait().await;
}
