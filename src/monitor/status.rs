//! Status LED rendering.
//!
//! Two independent loops:
//! - the led-state renderer derives [`LedState`] from one consistent
//!   snapshot of the shared state and pushes RGB duty cycles on change;
//! - the activity blink drives the discrete tx/rx indicator pins high for a
//!   fixed window after the most recent observed tx/rx event.

use crate::hardware::{pins, DigitalIo, PinDirection, PinPull, Pwm};
use crate::state::{LedState, SharedState};
use crate::task::StopToken;
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Activity pins stay high this long after an observed event.
const ACTIVITY_WINDOW: Duration = Duration::from_millis(250);
/// Activity sampling cadence.
const ACTIVITY_SAMPLE: Duration = Duration::from_millis(100);
/// Led-state sampling cadence.
const LED_STATE_SAMPLE: Duration = Duration::from_secs(1);
/// PWM frequency for the RGB channels.
const RGB_PWM_HZ: f64 = 1000.0;

#[derive(Clone)]
pub struct StatusIndicator {
    gpio: Arc<dyn DigitalIo>,
    pwm: Arc<dyn Pwm>,
    state: SharedState,
}

impl StatusIndicator {
    pub fn new(gpio: Arc<dyn DigitalIo>, pwm: Arc<dyn Pwm>, state: SharedState) -> Self {
        Self { gpio, pwm, state }
    }

    /// Configure the indicator pins and drive them to their boot levels:
    /// transceiver enabled, activity LEDs off, status lit, RGB green.
    pub async fn setup(&self) -> Result<()> {
        for pin in [
            pins::DRIVER_ENABLE,
            pins::RECEIVER_ENABLE,
            pins::TX_LED,
            pins::RX_LED,
            pins::STATUS_LED,
        ] {
            self.gpio
                .setup(pin, PinDirection::Output, PinPull::None)
                .await?;
        }

        self.pwm.start(pins::RED_LED, 0.0, RGB_PWM_HZ).await?;
        self.pwm.start(pins::GREEN_LED, 100.0, RGB_PWM_HZ).await?;
        self.pwm.start(pins::BLUE_LED, 0.0, RGB_PWM_HZ).await?;

        self.gpio.write(pins::DRIVER_ENABLE, true).await?;
        self.gpio.write(pins::RECEIVER_ENABLE, false).await?;
        self.gpio.write(pins::TX_LED, false).await?;
        self.gpio.write(pins::RX_LED, false).await?;
        self.gpio.write(pins::STATUS_LED, true).await?;
        Ok(())
    }

    /// Derive and render the LED state until stopped.
    pub async fn run_led_state(self, mut token: StopToken) {
        info!("led state renderer started");
        let mut rendered: Option<LedState> = None;

        while !token.is_stopped() {
            let (derived, reset_held) = {
                // One locked snapshot; the derivation must not mix instants.
                let mut state = self.state.write().await;
                let derived = state.derive_led_state();
                state.led_state = derived;
                (derived, state.reset_held)
            };

            if reset_held {
                // The reset watcher owns the RGB pins while the button is
                // held; forget what was rendered so the release repaints.
                rendered = None;
            } else if rendered != Some(derived) {
                info!("led state -> {derived:?}");
                self.render(derived).await;
                rendered = Some(derived);
            }

            if !token.sleep(LED_STATE_SAMPLE).await {
                break;
            }
        }
        info!("led state renderer stopped");
    }

    /// Blink the tx/rx indicator pins on recent activity until stopped.
    pub async fn run_activity_blink(self, mut token: StopToken) {
        info!("activity blink started");

        while !token.is_stopped() {
            let now = Instant::now();
            let (last_tx, last_rx) = {
                let state = self.state.read().await;
                (state.last_tx, state.last_rx)
            };

            let tx_lit = recent(now, last_tx);
            let rx_lit = recent(now, last_rx);
            if let Err(err) = self.gpio.write(pins::TX_LED, tx_lit).await {
                warn!("tx indicator write failed: {err:#}");
            }
            if let Err(err) = self.gpio.write(pins::RX_LED, rx_lit).await {
                warn!("rx indicator write failed: {err:#}");
            }

            if !token.sleep(ACTIVITY_SAMPLE).await {
                break;
            }
        }
        info!("activity blink stopped");
    }

    async fn render(&self, led_state: LedState) {
        let (red, green, blue) = duty_cycles(led_state);
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

fn recent(now: Instant, event: Option<Instant>) -> bool {
    event.is_some_and(|at| now.duration_since(at) < ACTIVITY_WINDOW)
}

/// RGB duty-cycle tuple for a display state.
pub fn duty_cycles(led_state: LedState) -> (f64, f64, f64) {
    match led_state {
        LedState::NormalConnected => (0.0, 100.0, 0.0),
        LedState::NoHub => (0.0, 0.0, 100.0),
        LedState::Error => (100.0, 0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{MockGpio, MockPwm};
    use crate::state::{note_tx_activity, shared_state};
    use crate::task::StopSignal;

    fn indicator(gpio: &MockGpio, pwm: &MockPwm, state: &SharedState) -> StatusIndicator {
        StatusIndicator::new(Arc::new(gpio.clone()), Arc::new(pwm.clone()), state.clone())
    }

    #[test]
    fn duty_cycle_mapping() {
        assert_eq!(duty_cycles(LedState::NormalConnected), (0.0, 100.0, 0.0));
        assert_eq!(duty_cycles(LedState::NoHub), (0.0, 0.0, 100.0));
        assert_eq!(duty_cycles(LedState::Error), (100.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn setup_drives_boot_levels() {
        let gpio = MockGpio::new();
        let pwm = MockPwm::new();
        let state = shared_state();

        indicator(&gpio, &pwm, &state).setup().await.unwrap();

        assert!(gpio.level(pins::DRIVER_ENABLE).await);
        assert!(!gpio.level(pins::RECEIVER_ENABLE).await);
        assert!(gpio.level(pins::STATUS_LED).await);
        assert_eq!(pwm.duty(pins::GREEN_LED).await, Some(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_follows_state_transitions() {
        let gpio = MockGpio::new();
        let pwm = MockPwm::new();
        let state = shared_state();

        let (signal, token) = StopSignal::new();
        let handle = tokio::spawn(indicator(&gpio, &pwm, &state).run_led_state(token));

        // Starts disconnected: NO_HUB is blue.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pwm.duty(pins::BLUE_LED).await, Some(100.0));
        assert_eq!(state.read().await.led_state, LedState::NoHub);

        state.write().await.network_connected = true;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pwm.duty(pins::GREEN_LED).await, Some(100.0));
        assert_eq!(pwm.duty(pins::BLUE_LED).await, Some(0.0));

        state.write().await.shutdown_elapsed = true;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pwm.duty(pins::RED_LED).await, Some(100.0));
        assert_eq!(state.read().await.led_state, LedState::Error);

        signal.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_yields_rgb_pins_during_button_hold() {
        let gpio = MockGpio::new();
        let pwm = MockPwm::new();
        let state = shared_state();

        let (signal, token) = StopSignal::new();
        let handle = tokio::spawn(indicator(&gpio, &pwm, &state).run_led_state(token));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pwm.duty(pins::BLUE_LED).await, Some(100.0));

        // Button goes down; the hub also comes back mid-hold. The renderer
        // must not touch the RGB pins until the hold ends.
        {
            let mut state = state.write().await;
            state.reset_held = true;
            state.network_connected = true;
        }
        pwm.set_duty_cycle(pins::GREEN_LED, 0.0).await.unwrap();
        pwm.set_duty_cycle(pins::BLUE_LED, 100.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(pwm.duty(pins::GREEN_LED).await, Some(0.0));
        assert_eq!(pwm.duty(pins::BLUE_LED).await, Some(100.0));

        // Release: the renderer repaints the derived state.
        state.write().await.reset_held = false;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pwm.duty(pins::GREEN_LED).await, Some(100.0));
        assert_eq!(pwm.duty(pins::BLUE_LED).await, Some(0.0));

        signal.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn activity_window_lights_and_clears_tx() {
        let gpio = MockGpio::new();
        let pwm = MockPwm::new();
        let state = shared_state();

        let (signal, token) = StopSignal::new();
        let handle = tokio::spawn(indicator(&gpio, &pwm, &state).run_activity_blink(token));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!gpio.level(pins::TX_LED).await);

        note_tx_activity(&state).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(gpio.level(pins::TX_LED).await);

        // Past the 250ms window the pin drops again.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!gpio.level(pins::TX_LED).await);

        signal.stop();
        handle.await.unwrap();
    }
}
