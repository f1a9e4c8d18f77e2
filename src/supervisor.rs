//! Monitor lifecycle supervisor.
//!
//! Owns the shared state and the monitor tasks: `start()` performs the
//! one-shot hardware/network bring-up and spawns every loop, `request_stop`
//! signals cooperative cancellation, and `wait()` joins everything and
//! resolves to the terminal outcome the hosting process acts on (shutdown,
//! soft reset, factory reset). The supervisor sequences but never executes
//! device-level actions.

use crate::config::Settings;
use crate::hardware::{DigitalIo, HubProbe, NetworkManager, PowerStatus, Pwm, VoltageSense};
use crate::monitor::{
    NetworkMonitor, NetworkMonitorConfig, PowerMonitor, PowerMonitorConfig, ResetOutcome,
    ResetWatcher, ResetWatcherConfig, StatusIndicator,
};
use crate::state::{shared_state, SharedState};
use crate::task::StopSignal;
use log::{info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Hardware capability handles the supervisor distributes to monitors.
/// Each handle is owned by exactly one monitor loop at a time.
#[derive(Clone)]
pub struct Capabilities {
    pub gpio: Arc<dyn DigitalIo>,
    pub pwm: Arc<dyn Pwm>,
    pub pmic: Arc<dyn PowerStatus>,
    pub adc: Arc<dyn VoltageSense>,
    pub net: Arc<dyn NetworkManager>,
    pub probe: Arc<dyn HubProbe>,
}

#[derive(Clone, Debug, Default)]
pub struct SupervisorConfig {
    pub power: PowerMonitorConfig,
    pub network: NetworkMonitorConfig,
    pub reset: ResetWatcherConfig,
}

/// Terminal result of a supervised run. All false when stopped externally
/// before any terminal signal fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupervisorOutcome {
    /// Time-on-battery exceeded the shutdown threshold.
    pub shutdown_elapsed: bool,
    /// The reset button was pressed (soft reset).
    pub reset_requested: bool,
    /// The reset button was held past the firmware-reset threshold.
    pub factory_reset_requested: bool,
}

pub struct Supervisor {
    capabilities: Capabilities,
    settings: Settings,
    config: SupervisorConfig,
    state: SharedState,
}

impl Supervisor {
    pub fn new(capabilities: Capabilities, settings: Settings, config: SupervisorConfig) -> Self {
        Self {
            capabilities,
            settings,
            config,
            state: shared_state(),
        }
    }

    /// Handle to the shared state, for the hosting process (activity stamps,
    /// status queries).
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Bring up the indicator hardware and the network, then spawn every
    /// monitor loop.
    pub async fn start(self) -> RunningSupervisor {
        info!("supervisor starting");
        let (signal, _) = StopSignal::new();

        let indicator = StatusIndicator::new(
            self.capabilities.gpio.clone(),
            self.capabilities.pwm.clone(),
            self.state.clone(),
        );
        if let Err(err) = indicator.setup().await {
            warn!("status indicator setup failed: {err:#}");
        }

        let mut network = NetworkMonitor::new(
            self.capabilities.net.clone(),
            self.capabilities.probe.clone(),
            self.state.clone(),
            self.settings.wifi_enabled(),
            self.settings.static_ipv4(),
            self.config.network.clone(),
        );
        network.initialize().await;

        let power = PowerMonitor::new(
            self.capabilities.pmic.clone(),
            self.capabilities.adc.clone(),
            self.state.clone(),
            self.config.power.clone(),
        );
        let reset = ResetWatcher::new(
            self.capabilities.gpio.clone(),
            self.capabilities.pwm.clone(),
            self.state.clone(),
            self.config.reset.clone(),
        );

        let power_task = tokio::spawn(power.run(signal.token()));
        let reset_task = tokio::spawn(reset.watch(signal.token()));
        let network_task = tokio::spawn(network.run(signal.token()));
        let led_task = tokio::spawn(indicator.clone().run_led_state(signal.token()));
        let blink_task = tokio::spawn(indicator.run_activity_blink(signal.token()));

        RunningSupervisor {
            signal,
            state: self.state,
            power_task,
            reset_task,
            network_task,
            led_task,
            blink_task,
        }
    }
}

/// Handle on a started supervisor: stop signalling plus join/outcome.
pub struct RunningSupervisor {
    signal: StopSignal,
    state: SharedState,
    power_task: JoinHandle<bool>,
    reset_task: JoinHandle<ResetOutcome>,
    network_task: JoinHandle<()>,
    led_task: JoinHandle<()>,
    blink_task: JoinHandle<()>,
}

impl RunningSupervisor {
    /// Request cooperative shutdown of every monitor loop. Idempotent and
    /// safe to call from any task.
    pub fn request_stop(&self) {
        self.signal.stop();
    }

    /// A clonable stop handle, e.g. for a ctrl-c task.
    pub fn stop_signal(&self) -> StopSignal {
        self.signal.clone()
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Wait for a terminal signal (shutdown-elapsed or reset), stop all
    /// remaining loops, join them, and report the outcome.
    pub async fn wait(mut self) -> SupervisorOutcome {
        enum First {
            Power(Result<bool, tokio::task::JoinError>),
            Reset(Result<ResetOutcome, tokio::task::JoinError>),
        }

        let first = tokio::select! {
            power = &mut self.power_task => First::Power(power),
            reset = &mut self.reset_task => First::Reset(reset),
        };
        self.signal.stop();

        let (power_result, reset_result) = match first {
            First::Power(power) => (power, self.reset_task.await),
            First::Reset(reset) => (self.power_task.await, reset),
        };

        for (name, task) in [
            ("network monitor", self.network_task),
            ("led state renderer", self.led_task),
            ("activity blink", self.blink_task),
        ] {
            if let Err(err) = task.await {
                warn!("{name} task failed: {err}");
            }
        }

        let shutdown_elapsed = power_result.unwrap_or_else(|err| {
            warn!("power monitor task failed: {err}");
            false
        });
        let reset = reset_result.unwrap_or_else(|err| {
            warn!("reset watcher task failed: {err}");
            ResetOutcome::default()
        });

        let outcome = SupervisorOutcome {
            shutdown_elapsed,
            reset_requested: reset.was_pressed,
            factory_reset_requested: reset.firmware_reset,
        };
        info!("supervisor resolved: {outcome:?}");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{
        MockGpio, MockHubProbe, MockNetworkManager, MockPowerStatus, MockPwm, MockVoltageSense,
    };
    use crate::hardware::pins;
    use std::time::Duration;

    struct Mocks {
        gpio: MockGpio,
        pwm: MockPwm,
        pmic: MockPowerStatus,
        adc: MockVoltageSense,
        net: MockNetworkManager,
        probe: MockHubProbe,
    }

    impl Mocks {
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
    }

    fn supervisor(mocks: &Mocks) -> Supervisor {
        Supervisor::new(
            mocks.capabilities(),
            Settings::defaults(),
            SupervisorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn battery_expiry_resolves_shutdown_outcome() {
        let mocks = Mocks::new();
        mocks.pmic.set_on_battery(true).await;

        let running = supervisor(&mocks).start().await;
        let outcome = running.wait().await;

        assert!(outcome.shutdown_elapsed);
        assert!(!outcome.reset_requested);
        assert!(!outcome.factory_reset_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn long_button_hold_resolves_factory_reset() {
        let mocks = Mocks::new();
        mocks.gpio.set_level(pins::FACTORY_RESET, true).await;

        let running = supervisor(&mocks).start().await;
        let outcome = running.wait().await;

        assert!(outcome.factory_reset_requested);
        assert!(outcome.reset_requested);
        assert!(!outcome.shutdown_elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn external_stop_resolves_with_no_terminal_signal() {
        let mocks = Mocks::new();
        let running = supervisor(&mocks).start().await;

        let signal = running.stop_signal();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            signal.stop();
        });

        let outcome = running.wait().await;
        assert_eq!(outcome, SupervisorOutcome::default());
    }

    #[tokio::test(start_paused = true)]
    async fn request_stop_is_idempotent_under_concurrency() {
        let mocks = Mocks::new();
        let running = supervisor(&mocks).start().await;

        running.request_stop();
        running.request_stop();
        let outcome = running.wait().await;
        assert_eq!(outcome, SupervisorOutcome::default());
    }
}
