//! Demo entry point for the hub supervisor.
//!
//! Real deployments embed [`hub_supervisor::supervisor::Supervisor`] in the
//! device process and hand it hardware-backed capability implementations.
//! This binary wires the mock capabilities instead so the supervision logic
//! can be exercised on a development machine: it runs until the (mock)
//! battery shutdown threshold elapses or ctrl-c requests a stop.

use clap::Parser;
use hub_supervisor::config::Settings;
use hub_supervisor::error::AppResult;
use hub_supervisor::hardware::mock::{
    MockGpio, MockHubProbe, MockNetworkManager, MockPowerStatus, MockPwm, MockVoltageSense,
};
use hub_supervisor::monitor::PowerMonitorConfig;
use hub_supervisor::supervisor::{Capabilities, Supervisor, SupervisorConfig};
use log::info;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hub-supervisor", about = "Embedded hub supervisory core (mock hardware demo)")]
struct Args {
    /// Path to the persisted settings file.
    #[arg(long, default_value = hub_supervisor::config::DEFAULT_SETTINGS_PATH)]
    settings: String,

    /// Battery shutdown threshold in seconds.
    #[arg(long, default_value_t = 10)]
    shutdown_threshold_secs: u64,

    /// Simulate running on battery power.
    #[arg(long)]
    on_battery: bool,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = Settings::load(&args.settings)?;
    info!(
        "settings loaded from {} (wifi enabled: {})",
        settings.path().display(),
        settings.wifi_enabled()
    );

    let gpio = MockGpio::new();
    let pwm = MockPwm::new();
    let pmic = MockPowerStatus::new();
    let adc = MockVoltageSense::new();
    let net = MockNetworkManager::new();
    let probe = MockHubProbe::new();

    net.set_services(vec![MockNetworkManager::wired_service("10.0.0.2")])
        .await;
    probe.set_reachable(true).await;
    if args.on_battery {
        pmic.set_on_battery(true).await;
    }

    let capabilities = Capabilities {
        gpio: Arc::new(gpio),
        pwm: Arc::new(pwm),
        pmic: Arc::new(pmic),
        adc: Arc::new(adc),
        net: Arc::new(net),
        probe: Arc::new(probe),
    };

    let config = SupervisorConfig {
        power: PowerMonitorConfig {
            shutdown_threshold: Duration::from_secs(args.shutdown_threshold_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    let running = Supervisor::new(capabilities, settings, config).start().await;

    let stop = running.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping monitors");
            stop.stop();
        }
    });

    let outcome = running.wait().await;
    info!(
        "terminal outcome: shutdown_elapsed={} reset_requested={} factory_reset_requested={}",
        outcome.shutdown_elapsed, outcome.reset_requested, outcome.factory_reset_requested
    );
    Ok(())
}
