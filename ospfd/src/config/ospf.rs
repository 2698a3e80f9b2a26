use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HELLO_INTERVAL: u16 = 10;
pub const DEFAULT_DEAD_INTERVAL: u32 = 40;
pub const DEFAULT_RETRANSMIT_INTERVAL: u16 = 5;
pub const DEFAULT_COST: u16 = 10;
pub const DEFAULT_PRIORITY: u8 = 1;
pub const DEFAULT_MTU: u16 = 1500;
pub const DEFAULT_SPF_INTERVAL: u64 = 5;
pub const DEFAULT_LSDB_CAPACITY: usize = 10000;
pub const DEFAULT_LIST_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OspfConfig {
    pub router_id: Option<Ipv4Addr>,
    pub spf_interval: u64,
    pub lsdb_capacity: usize,
    pub list_capacity: usize,
    pub tracing: TracingConfig,
    pub interfaces: Vec<InterfaceConfig>,
}

impl Default for OspfConfig {
    fn default() -> Self {
        Self {
            router_id: None,
            spf_interval: DEFAULT_SPF_INTERVAL,
            lsdb_capacity: DEFAULT_LSDB_CAPACITY,
            list_capacity: DEFAULT_LIST_CAPACITY,
            tracing: TracingConfig::default(),
            interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkType {
    #[default]
    Broadcast,
    PointToPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceConfig {
    pub name: String,
    #[serde(default)]
    pub ifindex: Option<u32>,
    pub address: Ipv4Net,
    #[serde(default = "default_area")]
    pub area: Ipv4Addr,
    #[serde(default = "default_cost")]
    pub cost: u16,
    #[serde(default, rename = "type")]
    pub network_type: NetworkType,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_hello_interval")]
    pub hello_interval: u16,
    #[serde(default = "default_dead_interval")]
    pub dead_interval: u32,
    #[serde(default = "default_retransmit_interval")]
    pub retransmit_interval: u16,
    #[serde(default)]
    pub passive: bool,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

fn default_area() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_cost() -> u16 {
    DEFAULT_COST
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn default_hello_interval() -> u16 {
    DEFAULT_HELLO_INTERVAL
}

fn default_dead_interval() -> u32 {
    DEFAULT_DEAD_INTERVAL
}

fn default_retransmit_interval() -> u16 {
    DEFAULT_RETRANSMIT_INTERVAL
}

fn default_mtu() -> u16 {
    DEFAULT_MTU
}

impl InterfaceConfig {
    pub fn new(name: &str, address: Ipv4Net, area: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            ifindex: None,
            address,
            area,
            cost: DEFAULT_COST,
            network_type: NetworkType::Broadcast,
            priority: DEFAULT_PRIORITY,
            hello_interval: DEFAULT_HELLO_INTERVAL,
            dead_interval: DEFAULT_DEAD_INTERVAL,
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            passive: false,
            mtu: DEFAULT_MTU,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TracingConfig {
    pub all: bool,
    pub packet: Vec<PacketTraceConfig>,
    pub event: Vec<String>,
    pub fsm: Vec<String>,
    pub database: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketTraceConfig {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub direction: Option<String>,
}

impl OspfConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: OspfConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spf_interval == 0 {
            bail!("spf-interval must be positive");
        }
        let mut names = BTreeSet::new();
        for ifc in self.interfaces.iter() {
            if ifc.name.is_empty() {
                bail!("Interface name is empty");
            }
            if !names.insert(ifc.name.as_str()) {
                bail!("Interface {} is configured twice", ifc.name);
            }
            if ifc.address.addr().is_unspecified() {
                bail!("Interface {} has no address", ifc.name);
            }
            if ifc.hello_interval == 0 || ifc.retransmit_interval == 0 {
                bail!("Interface {} has a zero interval", ifc.name);
            }
            if ifc.dead_interval <= ifc.hello_interval as u32 {
                bail!(
                    "Interface {} dead-interval must exceed hello-interval",
                    ifc.name
                );
            }
        }
        Ok(())
    }

    /// Configured router ID, otherwise the highest interface address.
    pub fn router_id(&self) -> Ipv4Addr {
        self.router_id.unwrap_or_else(|| {
            self.interfaces
                .iter()
                .map(|ifc| ifc.address.addr())
                .max()
                .unwrap_or(Ipv4Addr::UNSPECIFIED)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
router-id: 1.1.1.1
spf-interval: 3
tracing:
  packet:
    - type: hello
      direction: recv
  fsm: [nfsm]
interfaces:
  - name: eth0
    address: 10.0.0.1/24
    area: 0.0.0.0
    cost: 5
  - name: eth1
    address: 192.168.1.1/30
    area: 0.0.0.1
    type: point-to-point
    priority: 0
    hello-interval: 5
    dead-interval: 20
"#;

    #[test]
    fn parse_config() {
        let config = OspfConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.router_id(), Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(config.spf_interval, 3);
        assert_eq!(config.lsdb_capacity, DEFAULT_LSDB_CAPACITY);
        assert_eq!(config.interfaces.len(), 2);

        let eth0 = &config.interfaces[0];
        assert_eq!(eth0.cost, 5);
        assert_eq!(eth0.network_type, NetworkType::Broadcast);
        assert_eq!(eth0.hello_interval, DEFAULT_HELLO_INTERVAL);
        assert_eq!(eth0.mtu, DEFAULT_MTU);

        let eth1 = &config.interfaces[1];
        assert_eq!(eth1.area, Ipv4Addr::new(0, 0, 0, 1));
        assert_eq!(eth1.network_type, NetworkType::PointToPoint);
        assert_eq!(eth1.priority, 0);
        assert_eq!(eth1.dead_interval, 20);

        assert_eq!(config.tracing.packet[0].typ, "hello");
        assert_eq!(config.tracing.fsm, vec!["nfsm".to_string()]);
    }

    #[test]
    fn router_id_from_interfaces() {
        let mut config = OspfConfig::from_yaml(CONFIG).unwrap();
        config.router_id = None;
        assert_eq!(config.router_id(), Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn reject_bad_intervals() {
        let text = r#"
interfaces:
  - name: eth0
    address: 10.0.0.1/24
    hello-interval: 40
    dead-interval: 40
"#;
        assert!(OspfConfig::from_yaml(text).is_err());
    }

    #[test]
    fn reject_duplicate_interface() {
        let text = r#"
interfaces:
  - name: eth0
    address: 10.0.0.1/24
  - name: eth0
    address: 10.0.1.1/24
"#;
        assert!(OspfConfig::from_yaml(text).is_err());
    }
}
