// Copyright (C) 2024-present The bgpcore Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use bgpcore_aspath_filter::FilterAction;
use bgpcore_bgp_speaker::{socket::BGP_PORT, AddressFamilies, ListenConfig, PeerSocketConfig};
use bgpcore_mrt::DumpKind;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde_with::serde_as;
use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
    time::Duration,
};

pub(crate) const fn default_bgp_port() -> u16 {
    BGP_PORT
}

pub(crate) const fn default_connect_retry() -> Duration {
    bgpcore_bgp_speaker::fsm::DEFAULT_CONNECT_RETRY_TIME
}

#[serde_as]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BgpdConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub listen: ListenSection,

    /// ConnectRetryTime of every peer
    #[serde(default = "default_connect_retry")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub connect_retry: Duration,

    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    #[serde(default)]
    pub as_path_access_lists: Vec<AsPathAccessListConfig>,

    #[serde(default)]
    pub dumps: Vec<DumpSection>,

    /// `debug bgp` categories enabled in config scope, e.g. `updates in`
    #[serde(default)]
    pub debug: Vec<String>,
}

#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads, the daemon runs on a current-thread runtime when unset
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListenSection {
    #[serde(default = "default_bgp_port")]
    pub port: u16,

    #[serde(default)]
    pub addresses: Vec<IpAddr>,

    #[serde(default)]
    pub address_families: Vec<AddressFamilyName>,
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            port: BGP_PORT,
            addresses: vec![],
            address_families: vec![],
        }
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressFamilyName {
    Ipv4,
    Ipv6,
}

impl ListenSection {
    /// Both families when none is listed
    pub fn families(&self) -> AddressFamilies {
        if self.address_families.is_empty() {
            return AddressFamilies::default();
        }
        AddressFamilies {
            ipv4: self.address_families.contains(&AddressFamilyName::Ipv4),
            ipv6: self.address_families.contains(&AddressFamilyName::Ipv6),
        }
    }

    pub fn listen_config(&self) -> ListenConfig {
        ListenConfig {
            port: self.port,
            addresses: self.addresses.clone(),
            families: self.families(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerConfig {
    pub address: IpAddr,

    #[serde(default = "default_bgp_port")]
    pub port: u16,

    pub remote_as: u32,
    pub local_as: u32,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub ttl: Option<u8>,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub update_source: Option<IpAddr>,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub update_interface: Option<String>,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub source_port: Option<u16>,

    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub vrf: Option<String>,

    /// Wait for the peer to connect instead of connecting out
    #[serde(default)]
    pub passive: bool,

    /// The session runs with four-octet ASNs
    #[serde(default)]
    pub four_octet_asn: bool,
}

impl PeerConfig {
    pub fn socket_config(&self) -> PeerSocketConfig {
        PeerSocketConfig {
            remote: SocketAddr::new(self.address, self.port),
            local_as: self.local_as,
            remote_as: self.remote_as,
            ttl: self.ttl,
            password: self.password.clone(),
            update_source: self.update_source,
            update_interface: self.update_interface.clone(),
            source_port: self.source_port,
            vrf: self.vrf.clone(),
            four_octet_asn: self.four_octet_asn,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AsPathAccessListConfig {
    pub name: String,
    pub entries: Vec<AsPathEntryConfig>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AsPathEntryConfig {
    pub action: FilterAction,
    pub regex: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DumpSection {
    pub kind: DumpKind,
    pub path: String,
    /// `NhNm` re-open interval
    #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
    pub interval: Option<String>,
}

impl BgpdConfig {
    /// Read the YAML file, `BGPD_` prefixed environment variables override it
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("BGPD_"))
            .extract()
    }

    /// MD5 keys the listening sockets need for accepted sessions
    pub fn peer_passwords(&self) -> Vec<(IpAddr, String)> {
        self.peers
            .iter()
            .filter_map(|peer| peer.password.clone().map(|password| (peer.address, password)))
            .collect()
    }

    /// Configuration commands equivalent to the file, in the order they are
    /// applied at startup
    pub fn command_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for category in &self.debug {
            lines.push(format!("debug bgp {category}"));
        }
        for list in &self.as_path_access_lists {
            for entry in &list.entries {
                lines.push(format!(
                    "ip as-path access-list {} {} {}",
                    list.name, entry.action, entry.regex
                ));
            }
        }
        for dump in &self.dumps {
            match &dump.interval {
                Some(interval) => {
                    lines.push(format!("dump bgp {} {} {interval}", dump.kind, dump.path))
                }
                None => lines.push(format!("dump bgp {} {}", dump.kind, dump.path)),
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
logging:
  level: debug
listen:
  port: 1179
  address_families: [ipv4]
connect_retry: 30
peers:
  - address: 192.0.2.1
    remote_as: 65001
    local_as: 65000
    password: secret
  - address: 2001:db8::2
    port: 2179
    remote_as: 65000
    local_as: 65000
    update_interface: eth0
    passive: true
    four_octet_asn: true
as_path_access_lists:
  - name: "10"
    entries:
      - action: permit
        regex: "_65001_"
      - action: deny
        regex: ".*"
dumps:
  - kind: routes-mrt
    path: /var/log/bgp-routes.%Y%m%d
    interval: 2h
debug: [fsm, "updates in"]
"#;

    fn load(text: &str) -> BgpdConfig {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        BgpdConfig::load(file.path()).unwrap()
    }

    #[test]
    fn test_load() {
        let config = load(CONFIG);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.runtime.threads, None);
        assert_eq!(config.connect_retry, Duration::from_secs(30));
        let listen = config.listen.listen_config();
        assert_eq!(listen.port, 1179);
        assert_eq!(listen.families, AddressFamilies { ipv4: true, ipv6: false });

        let first = config.peers[0].socket_config();
        assert_eq!(first.remote, "192.0.2.1:179".parse().unwrap());
        assert_eq!(first.password.as_deref(), Some("secret"));
        assert!(first.is_external());
        assert!(!first.four_octet_asn);
        let second = &config.peers[1];
        assert!(second.passive);
        assert_eq!(second.socket_config().remote.port(), 2179);
        assert_eq!(second.socket_config().update_interface.as_deref(), Some("eth0"));
        assert!(second.socket_config().four_octet_asn);

        assert_eq!(
            config.peer_passwords(),
            vec![("192.0.2.1".parse().unwrap(), "secret".to_string())]
        );
    }

    #[test]
    fn test_command_lines() {
        let config = load(CONFIG);
        assert_eq!(
            config.command_lines(),
            vec![
                "debug bgp fsm",
                "debug bgp updates in",
                "ip as-path access-list 10 permit _65001_",
                "ip as-path access-list 10 deny .*",
                "dump bgp routes-mrt /var/log/bgp-routes.%Y%m%d 2h",
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let config = load("peers: []\n");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.listen.port, BGP_PORT);
        assert_eq!(config.listen.families(), AddressFamilies::default());
        assert_eq!(config.connect_retry, default_connect_retry());
        assert!(config.command_lines().is_empty());
    }
}
