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


//! The `bgpd` daemon: configuration loading, the command surface and the
//! wiring of peers, listeners and MRT dumps.

pub mod commands;
pub mod config;
pub mod rib;

use crate::{
    commands::{CommandError, CommandHandler, CommandMode},
    config::BgpdConfig,
    rib::LocalRib,
};
use bgpcore_aspath_filter::AsPathFilterEngine;
use bgpcore_bgp_speaker::{
    debug::DebugFlags, BgpEvent, BgpListener, DebugState, PeerFsm, PeerRegistry,
    SystemInterfaceResolver,
};
use bgpcore_mrt::DumpManager;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum BgpdError {
    #[error("config line `{line}` rejected: {error}")]
    Config { line: String, error: CommandError },
}

#[derive(Debug)]
pub struct Bgpd {
    config: BgpdConfig,
    commands: CommandHandler,
    rib: LocalRib,
    debug: Arc<DebugState>,
    registry: PeerRegistry,
    shutdown: CancellationToken,
}

impl Bgpd {
    pub fn new(config: BgpdConfig) -> Self {
        let debug = Arc::new(DebugState::default());
        let rib = LocalRib::new();
        let dumps = DumpManager::new(Some(Arc::new(rib.clone())));

        let mut filters = AsPathFilterEngine::new();
        let add_debug = debug.clone();
        filters.set_add_hook(Box::new(move |name| {
            if add_debug.is_on(DebugFlags::FILTERS) {
                debug!("as-path access-list {name} added, re-evaluating filter-lists");
            }
        }));
        let delete_debug = debug.clone();
        filters.set_delete_hook(Box::new(move |name| {
            if delete_debug.is_on(DebugFlags::FILTERS) {
                debug!("as-path access-list {name} removed, re-evaluating filter-lists");
            }
        }));

        let commands = CommandHandler::new(Arc::new(RwLock::new(filters)), dumps, debug.clone());
        Self {
            config,
            commands,
            rib,
            debug,
            registry: PeerRegistry::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub const fn config(&self) -> &BgpdConfig {
        &self.config
    }

    pub const fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    pub const fn rib(&self) -> &LocalRib {
        &self.rib
    }

    pub const fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Cancelling the token stops [`Self::run`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the configuration commands of the file in config mode. Dumps are
    /// started here, so it must be called within a tokio runtime.
    pub fn apply_config(&self) -> Result<(), BgpdError> {
        for line in self.config.command_lines() {
            debug!("applying `{line}`");
            self.commands
                .execute(CommandMode::Config, &line)
                .map_err(|error| BgpdError::Config {
                    line: line.clone(),
                    error,
                })?;
        }
        Ok(())
    }

    fn start_peers(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(self.config.peers.len());
        for peer in &self.config.peers {
            let (fsm, handle) = PeerFsm::new(
                peer.socket_config(),
                SystemInterfaceResolver,
                self.debug.clone(),
                Some(self.commands.dumps().clone()),
                self.shutdown.child_token(),
            );
            let fsm = fsm.with_connect_retry_time(self.config.connect_retry);
            let start = if peer.passive {
                BgpEvent::ManualStartWithPassiveTcp
            } else {
                BgpEvent::ManualStart
            };
            handle.send(start);
            if let Some(previous) = self.registry.register(handle) {
                warn!("[{}] peer configured twice, the last entry wins", previous.peer());
            }
            tasks.push(tokio::spawn(async move {
                fsm.run().await;
            }));
        }
        tasks
    }

    /// Apply the configuration, start every peer and the listeners, then wait
    /// for the shutdown token
    pub async fn run(self) -> Result<(), BgpdError> {
        self.apply_config()?;
        let peers = self.start_peers();
        let listener = BgpListener::bind(
            &self.config.listen.listen_config(),
            self.registry.clone(),
            &self.config.peer_passwords(),
            self.shutdown.child_token(),
        );
        let listener = tokio::spawn(listener.run());
        info!("bgpd started with {} peers", peers.len());

        self.shutdown.cancelled().await;
        info!("bgpd shutting down");
        for task in peers {
            if let Err(err) = task.await {
                warn!("peer task failed: {err}");
            }
        }
        if let Err(err) = listener.await {
            warn!("listener task failed: {err}");
        }
        self.commands.dumps().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AsPathAccessListConfig, AsPathEntryConfig, DumpSection, ListenSection, LoggingConfig,
        PeerConfig, RuntimeConfig,
    };
    use bgpcore_aspath_filter::FilterAction;
    use bgpcore_mrt::DumpKind;
    use std::{net::Ipv4Addr, time::Duration};

    fn config() -> BgpdConfig {
        BgpdConfig {
            runtime: RuntimeConfig::default(),
            logging: LoggingConfig::default(),
            listen: ListenSection {
                port: 0,
                addresses: vec![Ipv4Addr::LOCALHOST.into()],
                address_families: vec![],
            },
            connect_retry: Duration::from_secs(5),
            peers: vec![PeerConfig {
                address: Ipv4Addr::new(127, 0, 0, 2).into(),
                port: 179,
                remote_as: 65001,
                local_as: 65000,
                ttl: None,
                password: None,
                update_source: None,
                update_interface: None,
                source_port: None,
                vrf: None,
                passive: true,
                four_octet_asn: false,
            }],
            as_path_access_lists: vec![AsPathAccessListConfig {
                name: "upstream".to_string(),
                entries: vec![AsPathEntryConfig {
                    action: FilterAction::Permit,
                    regex: "^65001_".to_string(),
                }],
            }],
            dumps: vec![],
            debug: vec!["filters".to_string()],
        }
    }

    #[tokio::test]
    async fn test_apply_config() {
        let bgpd = Bgpd::new(config());
        bgpd.apply_config().unwrap();
        assert_eq!(
            bgpd.commands().running_config(),
            "debug bgp filters\n!\nip as-path access-list upstream permit ^65001_\n!\n"
        );
    }

    #[tokio::test]
    async fn test_apply_config_rejects_bad_regex() {
        let mut config = config();
        config.as_path_access_lists[0].entries[0].regex = "[65001".to_string();
        let err = Bgpd::new(config).apply_config().unwrap_err();
        let BgpdError::Config { line, error } = err;
        assert_eq!(line, "ip as-path access-list upstream permit [65001");
        assert!(matches!(error, CommandError::RegexpCompileFail(_)));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.dumps.push(DumpSection {
            kind: DumpKind::All,
            path: dir.path().join("all.mrt").display().to_string(),
            interval: None,
        });
        let bgpd = Bgpd::new(config);
        let registry = bgpd.registry().clone();
        let shutdown = bgpd.shutdown_token();
        let task = tokio::spawn(bgpd.run());

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let handle = registry.get(&Ipv4Addr::new(127, 0, 0, 2).into()).unwrap();
        assert_eq!(handle.peer().port(), 179);

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert!(dir.path().join("all.mrt").exists());
    }
}
