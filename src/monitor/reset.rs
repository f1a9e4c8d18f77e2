//! Reset button watcher.
//!
//! Blocks until the reset button is released after a press (soft reset),
//! held past the firmware-reset threshold (factory reset), or the watch is
//! cancelled. The hardware line is debounced by the capability layer, so
//! sampling is a plain fast poll. While the button is held, the RGB status
//! LED alternates green/blue once a second as hold feedback.

use crate::hardware::{pins, DigitalIo, PinDirection, PinPull, Pwm};
use crate::state::SharedState;
use crate::task::StopToken;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct ResetWatcherConfig {
    /// Hold duration past which the press means a factory firmware reset.
    pub firmware_reset_threshold: Duration,
    /// Button sampling cadence.
    pub sample_interval: Duration,
}

impl Default for ResetWatcherConfig {
    fn default() -> Self {
        Self {
            firmware_reset_threshold: Duration::from_secs(20),
            sample_interval: Duration::from_millis(50),
        }
    }
}

/// Terminal result of a watch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    /// The button was pressed at least once.
    pub was_pressed: bool,
    /// The hold exceeded the firmware-reset threshold.
    pub firmware_reset: bool,
}

pub struct ResetWatcher {
    gpio: Arc<dyn DigitalIo>,
    pwm: Arc<dyn Pwm>,
    state: SharedState,
    config: ResetWatcherConfig,
}

impl ResetWatcher {
    pub fn new(
        gpio: Arc<dyn DigitalIo>,
        pwm: Arc<dyn Pwm>,
        state: SharedState,
        config: ResetWatcherConfig,
    ) -> Self {
        Self {
            gpio,
            pwm,
            state,
            config,
        }
    }

    /// Watch the button until a terminal condition or cancellation.
    pub async fn watch(self, mut token: StopToken) -> ResetOutcome {
        info!("reset watcher started");

        if let Err(err) = self
            .gpio
            .setup(pins::FACTORY_RESET, PinDirection::Input, PinPull::None)
            .await
        {
            warn!("reset button setup failed: {err:#}");
        }

        let watch_start = Instant::now();
        let mut press_start = Instant::now();
        let mut outcome = ResetOutcome::default();
        let mut last_pressed = false;

        while !token.is_stopped() {
            let pressed = match self.gpio.read(pins::FACTORY_RESET).await {
                Ok(level) => level,
                Err(err) => {
                    // A glitched sample must not read as a release; keep the
                    // last-known level and let the loop carry on.
                    warn!("reset button read failed: {err:#}");
                    last_pressed
                }
            };
            last_pressed = pressed;

            if pressed {
                if !outcome.was_pressed {
                    outcome.was_pressed = true;
                    info!("reset button pressed");
                    let mut state = self.state.write().await;
                    state.reset_held = true;
                    state.reset_hold_start = Some(press_start);
                }

                if press_start.elapsed() > self.config.firmware_reset_threshold {
                    outcome.firmware_reset = true;
                    info!("reset button held past firmware-reset threshold");
                    break;
                }

                // Alternating green/blue whole-second blink while held.
                let odd_second = watch_start.elapsed().as_secs() % 2 == 1;
                self.set_rgb(
                    0.0,
                    if odd_second { 0.0 } else { 100.0 },
                    if odd_second { 100.0 } else { 0.0 },
                )
                .await;
            } else {
                // Not pressed: keep moving the hold reference forward.
                press_start = Instant::now();
                if outcome.was_pressed {
                    info!("reset button released");
                    break;
                }
            }

            if !token.sleep(self.config.sample_interval).await {
                break;
            }
        }

        {
            let mut state = self.state.write().await;
            state.reset_held = false;
            state.reset_hold_start = None;
        }
        info!("reset watcher stopped");
        outcome
    }

    async fn set_rgb(&self, red: f64, green: f64, blue: f64) {
        for (pin, duty) in [
            (pins::RED_LED, red),
            (pins::GREEN_LED, green),
            (pins::BLUE_LED, blue),
        ] {
            if let Err(err) = self.pwm.set_duty_cycle(pin, duty).await {
                warn!("status LED update failed on {pin}: {err:#}");
            }
        }
    }
}
