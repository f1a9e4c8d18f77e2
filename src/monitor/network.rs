//! Network connectivity monitor.
//!
//! Maintains reachability to the hub endpoint over the preferred interface
//! (wifi when enabled by settings, else wired). Steady state probes the hub
//! once a minute; on loss it reassociates wifi and re-probes on a 10 s
//! cycle, degrading to a 30 s cycle past the attempt cap — it keeps retrying
//! indefinitely and never escalates to a reboot.

use crate::config::StaticIpv4;
use crate::hardware::{HubProbe, Ipv4Config, Ipv4Properties, NetworkManager};
use crate::state::SharedState;
use crate::task::StopToken;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const WIRED_INTERFACE: &str = "eth0";
const WIFI_INTERFACE: &str = "wlan0";
const WIFI_TECHNOLOGY_NAME: &str = "WiFi";

#[derive(Clone, Debug)]
pub struct NetworkMonitorConfig {
    /// SSID whose service the wifi interface associates with.
    pub ssid: String,
    /// TCP port of the hub endpoint on this device's address.
    pub hub_port: u16,
    pub probe_timeout: Duration,
    /// Idle time between probes while the hub is reachable.
    pub steady_idle: Duration,
    /// Pause between reconnect attempts.
    pub retry_pause: Duration,
    /// Coarser pause once `max_attempts` is exceeded.
    pub backoff_pause: Duration,
    pub max_attempts: u32,
    /// Bound on the scan-and-refind cycle when the SSID's service is absent.
    pub wifi_find_attempts: u32,
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self {
            ssid: "Alencon".to_string(),
            hub_port: 8888,
            probe_timeout: Duration::from_secs(5),
            steady_idle: Duration::from_secs(60),
            retry_pause: Duration::from_secs(10),
            backoff_pause: Duration::from_secs(30),
            max_attempts: 10,
            wifi_find_attempts: 5,
        }
    }
}

/// Per-interface view of a discovered service. Rebuilt on every refresh,
/// never persisted.
#[derive(Clone, Debug)]
pub struct NetworkConnection {
    pub interface: String,
    pub path: String,
    pub ipv4: Option<Ipv4Properties>,
}

pub struct NetworkMonitor {
    net: Arc<dyn NetworkManager>,
    probe: Arc<dyn HubProbe>,
    state: SharedState,
    wifi_enabled: bool,
    static_ipv4: Option<StaticIpv4>,
    config: NetworkMonitorConfig,
    connections: HashMap<String, NetworkConnection>,
}

impl NetworkMonitor {
    pub fn new(
        net: Arc<dyn NetworkManager>,
        probe: Arc<dyn HubProbe>,
        state: SharedState,
        wifi_enabled: bool,
        static_ipv4: Option<StaticIpv4>,
        config: NetworkMonitorConfig,
    ) -> Self {
        Self {
            net,
            probe,
            state,
            wifi_enabled,
            static_ipv4,
            config,
            connections: HashMap::new(),
        }
    }

    fn preferred_interface(&self) -> &'static str {
        if self.wifi_enabled {
            WIFI_INTERFACE
        } else {
            WIRED_INTERFACE
        }
    }

    /// One-shot startup work: discover connections, associate wifi if the
    /// configured SSID is not yet present, and apply the IPv4 method.
    pub async fn initialize(&mut self) {
        if let Err(err) = self.refresh_connections().await {
            warn!("network service discovery failed: {err:#}");
        }
        info!(
            "found network interfaces: {:?}",
            self.connections.keys().collect::<Vec<_>>()
        );

        if self.wifi_enabled && !self.connections.contains_key(WIFI_INTERFACE) {
            self.associate_wifi().await;
        }

        let ipv4 = match &self.static_ipv4 {
            Some(params) => Ipv4Config::Manual {
                address: params.address.clone(),
                netmask: params.netmask.clone(),
                gateway: params.gateway.clone(),
            },
            None => Ipv4Config::Dhcp,
        };
        match self.connections.get(self.preferred_interface()) {
            Some(connection) => {
                info!(
                    "applying {:?} on {}",
                    ipv4,
                    self.preferred_interface()
                );
                if let Err(err) = self.net.set_ipv4_config(&connection.path, &ipv4).await {
                    warn!("failed to apply IPv4 configuration: {err:#}");
                }
            }
            None => warn!(
                "no {} service found, IPv4 configuration not applied",
                self.preferred_interface()
            ),
        }
    }

    /// Run the monitor loop until stopped.
    pub async fn run(mut self, mut token: StopToken) {
        info!("network monitor started");

        while !token.is_stopped() {
            self.resolve_ip().await;
            if self.hub_connected().await {
                {
                    let mut state = self.state.write().await;
                    state.network_connected = true;
                }
                debug!("hub reachable, idling");
                if !token.sleep(self.config.steady_idle).await {
                    break;
                }
                continue;
            }

            info!("hub not reachable, resetting comms");
            self.state.write().await.network_connected = false;
            self.reconnect(&mut token).await;
        }

        info!("network monitor stopped");
    }

    /// Reconnect loop: runs until the hub is reachable again or a stop is
    /// requested. Past `max_attempts` the counter caps and the pause
    /// coarsens, but attempts continue indefinitely.
    async fn reconnect(&mut self, token: &mut StopToken) {
        while !token.is_stopped() {
            self.resolve_ip().await;

            let attempts = self.state.read().await.connection_attempts;
            let over_cap = attempts > self.config.max_attempts;
            if !over_cap {
                info!("attempting reconnect {attempts}");
            }

            let reassociated = if self.wifi_enabled {
                self.associate_wifi().await
            } else {
                true
            };
            if reassociated && self.hub_connected().await {
                info!("reconnection successful");
                let mut state = self.state.write().await;
                state.connection_attempts = 1;
                state.network_connected = true;
                return;
            }

            if over_cap {
                debug!("reconnect attempt cap reached, backing off");
            } else {
                info!("reconnection failed");
                self.state.write().await.connection_attempts = attempts + 1;
            }

            let pause = if over_cap {
                self.config.backoff_pause
            } else {
                self.config.retry_pause
            };
            if !token.sleep(pause).await {
                return;
            }
        }
    }

    /// Rebuild the per-interface connection map from the current services.
    async fn refresh_connections(&mut self) -> Result<()> {
        let services = self
            .net
            .services()
            .await
            .context("listing network services")?;

        self.connections.clear();
        for service in services {
            let Some(interface) = service.interface.clone() else {
                continue;
            };
            let keep = match interface.as_str() {
                WIRED_INTERFACE | "eth1" => true,
                // Only the configured SSID counts as our wifi service.
                WIFI_INTERFACE => service.name.as_deref() == Some(self.config.ssid.as_str()),
                _ => false,
            };
            if keep {
                self.connections.insert(
                    interface.clone(),
                    NetworkConnection {
                        interface,
                        path: service.path,
                        ipv4: service.ipv4,
                    },
                );
            }
        }
        Ok(())
    }

    /// Refresh and record the preferred interface's address in shared state.
    async fn resolve_ip(&mut self) {
        if let Err(err) = self.refresh_connections().await {
            warn!("network service discovery failed: {err:#}");
        }

        let ip = self
            .connections
            .get(self.preferred_interface())
            .and_then(|c| c.ipv4.as_ref())
            .and_then(|ipv4| ipv4.address.clone());

        match &ip {
            Some(address) => debug!("resolved IP {address}"),
            None => info!("valid IP not found"),
        }
        self.state.write().await.ip_address = ip;
    }

    async fn hub_connected(&self) -> bool {
        let Some(ip) = self.state.read().await.ip_address.clone() else {
            return false;
        };
        let url = format!("http://{}:{}", ip, self.config.hub_port);
        self.probe.probe(&url, self.config.probe_timeout).await
    }

    /// Power on the wifi technology, scan, and connect to the configured
    /// SSID's service. "Already enabled" and "already connected" count as
    /// success. The scan-and-refind cycle is a bounded loop; the enclosing
    /// reconnect loop supplies the long-term retry.
    async fn associate_wifi(&mut self) -> bool {
        let technology = match self.wifi_technology().await {
            Some(path) => path,
            None => {
                warn!("no wifi technology found");
                return false;
            }
        };

        for _ in 0..self.config.wifi_find_attempts {
            if let Err(err) = self.net.power_on(&technology).await {
                debug!("wifi already enabled: {err:#}");
            }
            if let Err(err) = self.net.scan(&technology).await {
                warn!("wifi scan failed: {err:#}");
            }
            if let Err(err) = self.refresh_connections().await {
                warn!("network service discovery failed: {err:#}");
            }

            if let Some(connection) = self.connections.get(WIFI_INTERFACE) {
                if let Err(err) = self.net.connect(&connection.path).await {
                    debug!("wifi already connected: {err:#}");
                }
                return true;
            }
        }

        info!(
            "wifi service for SSID {:?} not found after scan",
            self.config.ssid
        );
        false
    }

    async fn wifi_technology(&self) -> Option<String> {
        match self.net.technologies().await {
            Ok(technologies) => technologies
                .into_iter()
                .find(|t| t.name == WIFI_TECHNOLOGY_NAME)
                .map(|t| t.path),
            Err(err) => {
                warn!("listing network technologies failed: {err:#}");
                None
            }
        }
    }
}
