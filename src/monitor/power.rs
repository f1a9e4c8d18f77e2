//! Power source and battery monitor.
//!
//! Polls the power-management chip and the 5V rail sense, tracks continuous
//! time on battery, and signals a device shutdown once the configured
//! threshold is exceeded. The shutdown signal is terminal: the loop stops
//! and the supervisor sequences the shutdown path.

use crate::hardware::{pins, PowerStatus, VoltageSense};
use crate::state::SharedState;
use crate::task::StopToken;
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The 5V rail sense reads below this when external power is absent.
const SYS_5V_LOW_THRESHOLD: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct PowerMonitorConfig {
    /// Continuous time on battery after which shutdown is signalled.
    pub shutdown_threshold: Duration,
    /// Poll cadence while on battery.
    pub battery_poll: Duration,
    /// Source re-check cadence while on wired power.
    pub wired_recheck: Duration,
}

impl Default for PowerMonitorConfig {
    fn default() -> Self {
        Self {
            // Test-scale default; production deployments configure a much
            // larger threshold.
            shutdown_threshold: Duration::from_secs(10),
            battery_poll: Duration::from_millis(500),
            wired_recheck: Duration::from_secs(10),
        }
    }
}

pub struct PowerMonitor {
    pmic: Arc<dyn PowerStatus>,
    adc: Arc<dyn VoltageSense>,
    state: SharedState,
    config: PowerMonitorConfig,
}

impl PowerMonitor {
    pub fn new(
        pmic: Arc<dyn PowerStatus>,
        adc: Arc<dyn VoltageSense>,
        state: SharedState,
        config: PowerMonitorConfig,
    ) -> Self {
        Self {
            pmic,
            adc,
            state,
            config,
        }
    }

    /// Run the monitor loop until the shutdown threshold elapses or a stop
    /// is requested. Returns whether the shutdown threshold elapsed.
    pub async fn run(self, mut token: StopToken) -> bool {
        info!("power monitor started");

        let notify_mod = (self.config.shutdown_threshold.as_secs() / 5).max(1);
        let mut last_notify_second: u64 = 0;

        let (mut on_battery, mut charging) = match self.sample().await {
            Ok(sample) => sample,
            Err(err) => {
                warn!("initial power status read failed: {err:#}");
                (false, false)
            }
        };
        info!(
            "{}",
            if on_battery { "on battery power" } else { "on wired power" }
        );
        info!(
            "{}",
            if charging { "charging battery" } else { "not charging battery" }
        );

        let mut battery_since = Instant::now();
        {
            let mut state = self.state.write().await;
            state.on_battery = on_battery;
            state.charging = charging;
            state.time_on_battery = Duration::ZERO;
        }

        let mut shutdown_elapsed = false;
        while !token.is_stopped() {
            match self.sample().await {
                Ok((now_on_battery, now_charging)) => {
                    if charging != now_charging {
                        info!(
                            "{}",
                            if now_charging {
                                "started charging battery"
                            } else {
                                "stopped charging battery"
                            }
                        );
                    }
                    if on_battery != now_on_battery {
                        if now_on_battery {
                            battery_since = Instant::now();
                            info!("switched to battery power");
                        } else {
                            last_notify_second = 0;
                            info!("switched to wired power");
                        }
                    }
                    on_battery = now_on_battery;
                    charging = now_charging;
                }
                Err(err) => {
                    // Transient read failure: keep the last-known status.
                    warn!("power status read failed: {err:#}");
                }
            }

            let battery_errors = self.pmic.battery_errors().await.unwrap_or(false);
            let time_on_battery = if on_battery {
                battery_since.elapsed()
            } else {
                Duration::ZERO
            };

            {
                let mut state = self.state.write().await;
                state.on_battery = on_battery;
                state.charging = charging;
                state.battery_errors = battery_errors;
                state.time_on_battery = time_on_battery;
            }

            if on_battery {
                if time_on_battery > self.config.shutdown_threshold {
                    shutdown_elapsed = true;
                    self.state.write().await.shutdown_elapsed = true;
                    info!(
                        "on battery power for {} secs, starting shutdown",
                        time_on_battery.as_secs()
                    );
                    break;
                }

                let elapsed_secs = time_on_battery.as_secs();
                if should_notify(elapsed_secs, last_notify_second, notify_mod) {
                    last_notify_second = elapsed_secs;
                    info!(
                        "on battery power, auto-shutdown in {} seconds",
                        self.config.shutdown_threshold.as_secs() - elapsed_secs
                    );
                }

                if !token.sleep(self.config.battery_poll).await {
                    break;
                }
            } else if !token.sleep(self.config.wired_recheck).await {
                break;
            }
        }

        info!("power monitor stopped");
        shutdown_elapsed
    }

    /// One power-source sample: chip status OR'd with the low-voltage sense.
    async fn sample(&self) -> Result<(bool, bool)> {
        let chip_on_battery = self.pmic.on_battery().await?;
        let sys_5v = self.adc.read(pins::SYS_5V_SENSE).await?;
        let charging = self.pmic.charging().await?;
        Ok((chip_on_battery || sys_5v < SYS_5V_LOW_THRESHOLD, charging))
    }
}

/// Countdown notices fire at whole-second interval boundaries, at most once
/// per boundary.
fn should_notify(elapsed_secs: u64, last_notify_second: u64, notify_mod: u64) -> bool {
    elapsed_secs > last_notify_second && elapsed_secs % notify_mod == 0
}
