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


//! Scheduled MRT dump files.
//!
//! Each configured dump kind runs as its own task fed over an unbounded
//! channel. With an interval the output file is re-opened on every tick,
//! the first tick aligned to a multiple of the interval since midnight.

use crate::{
    interval::{parse_interval, IntervalError},
    record::{MrtRecord, MrtWritingError, SessionInfo, TableDumpEntry},
};
use bgpcore_bgp_pkt::{iana::BgpMessageType, wire::BGP_MARKER_LENGTH, PathAttributes};
use bytes::Bytes;
use chrono::{DateTime, Local, TimeZone, Timelike};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{self, Write},
    net::IpAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use strum_macros::{Display, EnumString, IntoStaticStr};
use tokio::{
    fs::File,
    io::AsyncWriteExt,
    sync::mpsc,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Offset of the message type octet, right after the marker and length
const MESSAGE_TYPE_OFFSET: usize = BGP_MARKER_LENGTH + 2;

#[derive(
    Display,
    EnumString,
    IntoStaticStr,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DumpKind {
    /// Every BGP message sent or received plus FSM state changes
    #[strum(serialize = "all")]
    All,
    /// Received and sent UPDATE messages only
    #[strum(serialize = "updates")]
    Updates,
    /// Periodic TABLE_DUMP of the routing table
    #[strum(serialize = "routes-mrt")]
    RoutesMrt,
}

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum DumpError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("bad dump filename template: {0}")]
    BadFilenameTemplate(String),

    #[error("dump bgp {0} is not configured")]
    NotConfigured(DumpKind),

    #[error("dump bgp routes-mrt needs a route source")]
    MissingRouteSource,

    #[error("I/O error: {0}")]
    StdIOError(String),

    #[error(transparent)]
    Writing(#[from] MrtWritingError),
}

bgpcore_parse_utils::impl_from_std_io_error!(DumpError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpConfig {
    kind: DumpKind,
    path: String,
    interval: Option<Duration>,
    interval_text: Option<String>,
}

impl DumpConfig {
    pub fn new(kind: DumpKind, path: &str, interval: Option<&str>) -> Result<Self, DumpError> {
        let interval_value = interval.map(parse_interval).transpose()?;
        expand_filename(path, &Local::now())?;
        Ok(Self {
            kind,
            path: path.to_string(),
            interval: interval_value,
            interval_text: interval.map(str::to_string),
        })
    }

    pub const fn kind(&self) -> DumpKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// The command that recreates this dump
    pub fn config_line(&self) -> String {
        match &self.interval_text {
            Some(interval) => format!("dump bgp {} {} {}", self.kind, self.path, interval),
            None => format!("dump bgp {} {}", self.kind, self.path),
        }
    }
}

/// Expand the strftime escapes of a filename template
pub fn expand_filename<Tz: TimeZone>(
    template: &str,
    now: &DateTime<Tz>,
) -> Result<String, DumpError>
where
    Tz::Offset: fmt::Display,
{
    let mut filename = String::with_capacity(template.len() + 16);
    write!(filename, "{}", now.format(template))
        .map_err(|_| DumpError::BadFilenameTemplate(template.to_string()))?;
    Ok(filename)
}

/// Delay until the next multiple of `interval` counted from midnight
pub fn first_tick_delay<Tz: TimeZone>(interval: Duration, now: &DateTime<Tz>) -> Duration {
    let interval_secs = interval.as_secs().max(1);
    let since_midnight = u64::from(now.num_seconds_from_midnight());
    Duration::from_secs(interval_secs - since_midnight % interval_secs)
}

/// What the session layer reports to the active dumps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpEvent {
    StateChange {
        session: SessionInfo,
        old_state: u16,
        new_state: u16,
    },
    Message {
        session: SessionInfo,
        message: Bytes,
    },
}

impl DumpEvent {
    fn is_update(&self) -> bool {
        match self {
            Self::Message { message, .. } => {
                message
                    .get(MESSAGE_TYPE_OFFSET)
                    .and_then(|code| BgpMessageType::try_from(*code).ok())
                    == Some(BgpMessageType::Update)
            }
            Self::StateChange { .. } => false,
        }
    }
}

impl From<DumpEvent> for MrtRecord {
    fn from(value: DumpEvent) -> Self {
        match value {
            DumpEvent::StateChange {
                session,
                old_state,
                new_state,
            } => MrtRecord::StateChange {
                session,
                old_state,
                new_state,
            },
            DumpEvent::Message { session, message } => MrtRecord::Message { session, message },
        }
    }
}

impl DumpKind {
    pub fn accepts(&self, event: &DumpEvent) -> bool {
        match self {
            Self::All => true,
            Self::Updates => event.is_update(),
            Self::RoutesMrt => false,
        }
    }
}

/// One best route as written into a TABLE_DUMP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRoute {
    pub prefix: IpNet,
    pub originated: u32,
    pub peer_address: IpAddr,
    pub peer_as: u32,
    pub attributes: PathAttributes,
}

/// Routing table snapshot provider for `routes-mrt` dumps
pub trait RouteSource: Send + Sync {
    fn table_routes(&self) -> Vec<DumpRoute>;
}

fn unix_timestamp() -> u32 {
    u32::try_from(Local::now().timestamp()).unwrap_or(u32::MAX)
}

struct DumpWriter {
    config: DumpConfig,
    file: Option<File>,
    routes: Option<Arc<dyn RouteSource>>,
}

impl DumpWriter {
    async fn reopen(&mut self) {
        self.close().await;
        let filename = match expand_filename(&self.config.path, &Local::now()) {
            Ok(filename) => filename,
            Err(err) => {
                error!("dump bgp {}: {err}", self.config.kind);
                return;
            }
        };
        match File::create(&filename).await {
            Ok(file) => {
                debug!("dump bgp {}: opened {filename}", self.config.kind);
                self.file = Some(file);
            }
            Err(err) => warn!("dump bgp {}: cannot open {filename}: {err}", self.config.kind),
        }
    }

    async fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.flush().await {
                warn!("dump bgp {}: flush failed: {err}", self.config.kind);
            }
        }
    }

    async fn write_record(&mut self, record: &MrtRecord) -> Result<(), DumpError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let encoded = record.encode(unix_timestamp())?;
        file.write_all(&encoded).await?;
        file.flush().await?;
        Ok(())
    }

    async fn write_event(&mut self, event: DumpEvent) {
        if let Err(err) = self.write_record(&MrtRecord::from(event)).await {
            warn!("dump bgp {}: write failed: {err}", self.config.kind);
        }
    }

    async fn dump_routes(&mut self) {
        let Some(routes) = self.routes.clone() else {
            return;
        };
        self.reopen().await;
        let mut sequence: u16 = 0;
        for route in routes.table_routes() {
            let record = MrtRecord::TableDump(TableDumpEntry {
                view: 0,
                sequence,
                prefix: route.prefix,
                originated: route.originated,
                peer_address: route.peer_address,
                peer_as: route.peer_as,
                attributes: route.attributes,
            });
            if let Err(err) = self.write_record(&record).await {
                warn!("dump bgp {}: route {} skipped: {err}", self.config.kind, route.prefix);
            }
            sequence = sequence.wrapping_add(1);
        }
        self.close().await;
    }

    async fn on_tick(&mut self) {
        match self.config.kind {
            DumpKind::RoutesMrt => self.dump_routes().await,
            DumpKind::All | DumpKind::Updates => self.reopen().await,
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<DumpEvent>,
        cancel: CancellationToken,
        replaced: Option<JoinHandle<()>>,
    ) {
        // The replaced writer may still be flushing to the same file
        if let Some(replaced) = replaced {
            if let Err(err) = replaced.await {
                error!("dump bgp {} task failed: {err}", self.config.kind);
            }
        }
        let mut next_tick = self
            .config
            .interval
            .map(|interval| Instant::now() + first_tick_delay(interval, &Local::now()));
        match self.config.kind {
            DumpKind::RoutesMrt if next_tick.is_some() => {}
            _ => self.on_tick().await,
        }
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        self.write_event(event).await;
                    }
                    break;
                }
                _ = wait_for(next_tick) => {
                    next_tick = self.config.interval.map(|interval| Instant::now() + interval);
                    self.on_tick().await;
                }
                event = rx.recv() => match event {
                    Some(event) => self.write_event(event).await,
                    None => break,
                }
            }
        }
        self.close().await;
        info!("dump bgp {} stopped", self.config.kind);
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[derive(Debug)]
struct ActiveDump {
    config: DumpConfig,
    tx: mpsc::UnboundedSender<DumpEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The set of configured dumps, at most one per [`DumpKind`]
#[derive(Clone, Default)]
pub struct DumpManager {
    active: Arc<Mutex<HashMap<DumpKind, ActiveDump>>>,
    routes: Option<Arc<dyn RouteSource>>,
}

impl fmt::Debug for DumpManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpManager")
            .field("active", &self.active)
            .field("routes", &self.routes.is_some())
            .finish()
    }
}

impl DumpManager {
    pub fn new(routes: Option<Arc<dyn RouteSource>>) -> Self {
        Self {
            active: Arc::default(),
            routes,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<DumpKind, ActiveDump>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a dump, replacing a running dump of the same kind. The new
    /// writer opens its file only after the replaced one has stopped. Must
    /// be called from within a tokio runtime.
    pub fn set(&self, config: DumpConfig) -> Result<(), DumpError> {
        if config.kind == DumpKind::RoutesMrt && self.routes.is_none() {
            return Err(DumpError::MissingRouteSource);
        }
        let mut active = self.lock_active();
        let replaced = active.remove(&config.kind).map(|previous| {
            previous.cancel.cancel();
            previous.handle
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let writer = DumpWriter {
            config: config.clone(),
            file: None,
            routes: self.routes.clone(),
        };
        let handle = tokio::spawn(writer.run(rx, cancel.clone(), replaced));
        info!("{}", config.config_line());
        active.insert(
            config.kind,
            ActiveDump {
                config,
                tx,
                cancel,
                handle,
            },
        );
        Ok(())
    }

    pub fn unset(&self, kind: DumpKind) -> Result<(), DumpError> {
        let removed = self
            .lock_active()
            .remove(&kind)
            .ok_or(DumpError::NotConfigured(kind))?;
        removed.cancel.cancel();
        info!("no dump bgp {kind}");
        Ok(())
    }

    /// Stop every dump and wait for the files to be flushed
    pub async fn shutdown(&self) {
        let active: Vec<ActiveDump> = self.lock_active().drain().map(|(_, dump)| dump).collect();
        for dump in active {
            dump.cancel.cancel();
            if let Err(err) = dump.handle.await {
                error!("dump bgp {} task failed: {err}", dump.config.kind);
            }
        }
    }

    fn broadcast(&self, event: DumpEvent) {
        for dump in self.lock_active().values() {
            if dump.config.kind.accepts(&event) && dump.tx.send(event.clone()).is_err() {
                warn!("dump bgp {} is no longer running", dump.config.kind);
            }
        }
    }

    pub fn state_change(&self, session: SessionInfo, old_state: u16, new_state: u16) {
        self.broadcast(DumpEvent::StateChange {
            session,
            old_state,
            new_state,
        });
    }

    pub fn message(&self, session: SessionInfo, message: Bytes) {
        self.broadcast(DumpEvent::Message { session, message });
    }

    pub fn is_configured(&self, kind: DumpKind) -> bool {
        self.lock_active().contains_key(&kind)
    }

    /// Configured dumps ordered by kind
    pub fn configs(&self) -> Vec<DumpConfig> {
        let mut configs: Vec<DumpConfig> = self
            .lock_active()
            .values()
            .map(|dump| dump.config.clone())
            .collect();
        configs.sort_by_key(|config| config.kind);
        configs
    }

    pub fn config_write(&self) -> String {
        self.configs()
            .iter()
            .map(|config| format!("{}\n", config.config_line()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgpcore_bgp_pkt::{path_attribute::Origin, AsPath};
    use chrono::Utc;
    use std::{net::Ipv4Addr, str::FromStr};

    fn session() -> SessionInfo {
        SessionInfo {
            peer_as: 65001,
            local_as: 65000,
            peer_address: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            local_address: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2)),
            if_index: 0,
            as4: true,
        }
    }

    fn message(message_type: u8) -> Bytes {
        let mut message = vec![0xff; 16];
        message.extend_from_slice(&[0x00, 0x13, message_type]);
        Bytes::from(message)
    }

    fn record_types(content: &[u8]) -> Vec<(u16, u16)> {
        let mut records = vec![];
        let mut offset = 0;
        while offset + 12 <= content.len() {
            let header = &content[offset..offset + 12];
            let mrt_type = u16::from_be_bytes([header[4], header[5]]);
            let sub_type = u16::from_be_bytes([header[6], header[7]]);
            let length = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
            records.push((mrt_type, sub_type));
            offset += 12 + length as usize;
        }
        assert_eq!(offset, content.len());
        records
    }

    struct StaticRoutes;

    impl RouteSource for StaticRoutes {
        fn table_routes(&self) -> Vec<DumpRoute> {
            ["10.0.0.0/8", "10.1.0.0/16"]
                .iter()
                .map(|prefix| DumpRoute {
                    prefix: prefix.parse().unwrap(),
                    originated: 0,
                    peer_address: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
                    peer_as: 65001,
                    attributes: PathAttributes::new(
                        Origin::Igp,
                        AsPath::from_sequence(vec![65001]),
                        Ipv4Addr::new(192, 0, 2, 1),
                    ),
                })
                .collect()
        }
    }

    #[test]
    fn test_dump_kind_text() {
        assert_eq!(DumpKind::from_str("routes-mrt"), Ok(DumpKind::RoutesMrt));
        assert_eq!(DumpKind::Updates.to_string(), "updates");
        assert!(DumpKind::from_str("routes").is_err());
    }

    #[test]
    fn test_expand_filename() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(
            expand_filename("/var/log/bgp-%Y%m%d.%H%M", &now),
            Ok("/var/log/bgp-20240309.0705".to_string())
        );
        assert_eq!(
            expand_filename("plain.dump", &now),
            Ok("plain.dump".to_string())
        );
    }

    #[test]
    fn test_first_tick_delay() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 10, 15, 0).unwrap();
        assert_eq!(
            first_tick_delay(Duration::from_secs(3600), &now),
            Duration::from_secs(2700)
        );
        let midnight = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(
            first_tick_delay(Duration::from_secs(600), &midnight),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_config_line() {
        let config = DumpConfig::new(DumpKind::All, "/tmp/all.dump", Some("1h30m")).unwrap();
        assert_eq!(config.interval(), Some(Duration::from_secs(5400)));
        assert_eq!(config.config_line(), "dump bgp all /tmp/all.dump 1h30m");
        let config = DumpConfig::new(DumpKind::Updates, "/tmp/up.dump", None).unwrap();
        assert_eq!(config.config_line(), "dump bgp updates /tmp/up.dump");
        assert!(matches!(
            DumpConfig::new(DumpKind::All, "/tmp/all.dump", Some("5x")),
            Err(DumpError::Interval(_))
        ));
    }

    #[test]
    fn test_accepts() {
        let update = DumpEvent::Message {
            session: session(),
            message: message(2),
        };
        let keepalive = DumpEvent::Message {
            session: session(),
            message: message(4),
        };
        assert!(DumpKind::All.accepts(&keepalive));
        assert!(DumpKind::Updates.accepts(&update));
        assert!(!DumpKind::Updates.accepts(&keepalive));
        assert!(!DumpKind::RoutesMrt.accepts(&update));
    }

    #[tokio::test]
    async fn test_dump_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.dump");
        let manager = DumpManager::default();
        manager
            .set(DumpConfig::new(DumpKind::All, path.to_str().unwrap(), None).unwrap())
            .unwrap();
        manager.state_change(session(), 1, 2);
        manager.message(session(), message(4));
        manager.shutdown().await;

        let content = std::fs::read(&path).unwrap();
        assert_eq!(record_types(&content), vec![(16, 5), (16, 4)]);
        assert!(!manager.is_configured(DumpKind::All));
    }

    #[tokio::test]
    async fn test_dump_updates_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("updates.dump");
        let manager = DumpManager::default();
        manager
            .set(DumpConfig::new(DumpKind::Updates, path.to_str().unwrap(), Some("1h")).unwrap())
            .unwrap();
        manager.state_change(session(), 1, 2);
        manager.message(session(), message(4));
        manager.message(session(), message(2));
        manager.shutdown().await;

        let content = std::fs::read(&path).unwrap();
        assert_eq!(record_types(&content), vec![(16, 4)]);
        assert_eq!(content[content.len() - 1], 2);
    }

    #[tokio::test]
    async fn test_dump_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.dump");
        let manager = DumpManager::new(Some(Arc::new(StaticRoutes)));
        manager
            .set(DumpConfig::new(DumpKind::RoutesMrt, path.to_str().unwrap(), None).unwrap())
            .unwrap();
        manager.shutdown().await;

        let content = std::fs::read(&path).unwrap();
        assert_eq!(record_types(&content), vec![(12, 1), (12, 1)]);
        // sequence numbers of the two entries
        assert_eq!(&content[14..16], &[0, 0]);
        let second = 12 + u32::from_be_bytes([content[8], content[9], content[10], content[11]])
            as usize;
        assert_eq!(&content[second + 14..second + 16], &[0, 1]);
    }

    #[tokio::test]
    async fn test_set_and_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.dump");
        let manager = DumpManager::default();
        assert_eq!(
            manager.unset(DumpKind::All),
            Err(DumpError::NotConfigured(DumpKind::All))
        );
        assert_eq!(
            manager.set(DumpConfig::new(DumpKind::RoutesMrt, "/tmp/r", None).unwrap()),
            Err(DumpError::MissingRouteSource)
        );
        manager
            .set(DumpConfig::new(DumpKind::All, path.to_str().unwrap(), Some("10m")).unwrap())
            .unwrap();
        assert_eq!(
            manager.config_write(),
            format!("dump bgp all {} 10m\n", path.to_str().unwrap())
        );
        assert_eq!(manager.unset(DumpKind::All), Ok(()));
        assert!(manager.configs().is_empty());
    }

    #[tokio::test]
    async fn test_replace_waits_for_previous_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.dump");
        let manager = DumpManager::default();
        let config = DumpConfig::new(DumpKind::All, path.to_str().unwrap(), None).unwrap();
        manager.set(config.clone()).unwrap();
        manager.message(session(), message(4));
        manager.message(session(), message(4));
        manager.set(config).unwrap();
        manager.message(session(), message(2));
        manager.shutdown().await;

        // The replacement truncated the file once the old writer was done
        let content = std::fs::read(&path).unwrap();
        assert_eq!(record_types(&content), vec![(16, 4)]);
        assert_eq!(content[content.len() - 1], 2);
    }
}
