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


//! TCP level part of the RFC4271 finite state machine.
//!
//! Events are consumed in the order they are raised from one queue per
//! peer. OPEN and KEEPALIVE processing sit above this layer, a session stays
//! in `OpenSent` until that layer takes over.

use crate::{
    connection::{ConnectionInput, IncomingConnection, IncomingQueue, PeerConnection},
    debug::{DebugFlags, DebugState, Direction},
    events::{BgpEvent, PeerNetEvent},
    socket::{InterfaceResolver, PeerSocketConfig},
};
use bgpcore_mrt::{DumpManager, SessionInfo};
use bytes::Bytes;
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// ConnectRetryTime suggested by RFC4271
pub const DEFAULT_CONNECT_RETRY_TIME: Duration = Duration::from_secs(120);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, strum_macros::Display)]
pub enum FsmState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl FsmState {
    /// State code used by BGP4MP state change records
    pub const fn mrt_code(&self) -> u16 {
        match self {
            FsmState::Idle => 1,
            FsmState::Connect => 2,
            FsmState::Active => 3,
            FsmState::OpenSent => 4,
            FsmState::OpenConfirm => 5,
            FsmState::Established => 6,
        }
    }
}

/// Sending side of a peer: its event queue and incoming connection FIFO
#[derive(Debug, Clone)]
pub struct PeerHandle {
    peer: SocketAddr,
    incoming: IncomingQueue,
    events: mpsc::UnboundedSender<BgpEvent>,
}

impl PeerHandle {
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn send(&self, event: BgpEvent) -> bool {
        if self.events.send(event).is_err() {
            warn!("[{}] peer is not running, dropped {event}", self.peer);
            return false;
        }
        true
    }

    /// Queue an accepted connection and raise `TcpConnValid`
    pub fn accept(&self, connection: IncomingConnection) -> PeerNetEvent {
        let event = self.incoming.push(connection);
        self.send(event.into());
        event
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[derive(Debug)]
pub struct PeerFsm<R> {
    state: FsmState,
    /// Started by an operator or automatically, cleared by ManualStop
    enabled: bool,
    connection: PeerConnection<R>,
    events: mpsc::UnboundedReceiver<BgpEvent>,
    pending: VecDeque<BgpEvent>,
    connect_retry_time: Duration,
    connect_retry_deadline: Option<Instant>,
    connect_retry_counter: u32,
    /// Session of the last handled event, kept for the transition that
    /// follows a connection torn down by the socket side
    last_session: Option<SessionInfo>,
    debug: Arc<DebugState>,
    dumps: Option<DumpManager>,
    shutdown: CancellationToken,
}

impl<R: InterfaceResolver> PeerFsm<R> {
    pub fn new(
        config: PeerSocketConfig,
        resolver: R,
        debug: Arc<DebugState>,
        dumps: Option<DumpManager>,
        shutdown: CancellationToken,
    ) -> (Self, PeerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let incoming = IncomingQueue::default();
        let handle = PeerHandle {
            peer: config.remote,
            incoming: incoming.clone(),
            events: tx,
        };
        let fsm = Self {
            state: FsmState::Idle,
            enabled: false,
            connection: PeerConnection::new(config, resolver, incoming),
            events: rx,
            pending: VecDeque::new(),
            connect_retry_time: DEFAULT_CONNECT_RETRY_TIME,
            connect_retry_deadline: None,
            connect_retry_counter: 0,
            last_session: None,
            debug,
            dumps,
            shutdown,
        };
        (fsm, handle)
    }

    pub fn with_connect_retry_time(mut self, connect_retry_time: Duration) -> Self {
        self.connect_retry_time = connect_retry_time;
        self
    }

    pub const fn state(&self) -> FsmState {
        self.state
    }

    pub const fn connect_retry_counter(&self) -> u32 {
        self.connect_retry_counter
    }

    pub const fn connection(&self) -> &PeerConnection<R> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut PeerConnection<R> {
        &mut self.connection
    }

    fn peer(&self) -> SocketAddr {
        self.connection.config().remote
    }

    fn session_info(&self) -> Option<SessionInfo> {
        let local = self.connection.local_addr()?;
        let remote = self.connection.remote_addr()?;
        let config = self.connection.config();
        Some(SessionInfo {
            peer_as: config.remote_as,
            local_as: config.local_as,
            peer_address: remote.ip().to_canonical(),
            local_address: local.ip().to_canonical(),
            if_index: 0,
            as4: config.four_octet_asn,
        })
    }

    fn start_connect_retry(&mut self) {
        self.connect_retry_deadline = Some(Instant::now() + self.connect_retry_time);
    }

    fn stop_connect_retry(&mut self) {
        self.connect_retry_deadline = None;
    }

    fn initiate_connect(&mut self) {
        if let Some(event) = self.connection.connect() {
            self.pending.push_back(event.into());
        }
    }

    fn start(&mut self, passive: bool) -> FsmState {
        self.enabled = true;
        self.connect_retry_counter = 0;
        self.start_connect_retry();
        if passive {
            FsmState::Active
        } else {
            self.initiate_connect();
            FsmState::Connect
        }
    }

    fn reject_incoming(&mut self) {
        while let Some(incoming) = self.connection.incoming().pop() {
            info!(
                "[{}] refusing connection from {} in state {}",
                self.peer(),
                incoming.remote,
                self.state
            );
        }
    }

    fn connection_failed(&mut self) -> FsmState {
        self.connection.disconnect();
        self.start_connect_retry();
        self.connect_retry_counter += 1;
        FsmState::Idle
    }

    /// Apply one event and return the new state
    pub fn handle_event(&mut self, event: BgpEvent) -> FsmState {
        let old_state = self.state;
        let session = self.session_info().or_else(|| self.last_session.take());
        if self.debug.is_on(DebugFlags::EVENTS) {
            debug!("[{}] {old_state} got event {event}", self.peer());
        }
        let new_state = match (old_state, event) {
            (_, BgpEvent::ManualStop) => {
                self.enabled = false;
                self.connection.disconnect();
                self.reject_incoming();
                self.stop_connect_retry();
                self.connect_retry_counter = 0;
                FsmState::Idle
            }
            (FsmState::Idle, BgpEvent::ManualStart | BgpEvent::AutomaticStart) => self.start(false),
            (FsmState::Idle, BgpEvent::ManualStartWithPassiveTcp) => self.start(true),
            (FsmState::Idle, BgpEvent::ConnectRetryTimerExpires) if self.enabled => {
                self.start_connect_retry();
                self.initiate_connect();
                FsmState::Connect
            }
            (FsmState::Idle, BgpEvent::Net(PeerNetEvent::TcpConnValid)) => {
                self.reject_incoming();
                FsmState::Idle
            }
            (FsmState::Idle, _) => FsmState::Idle,

            (
                FsmState::Connect | FsmState::Active,
                BgpEvent::Net(PeerNetEvent::TcpConnConfirmed),
            ) => {
                self.stop_connect_retry();
                FsmState::OpenSent
            }
            (FsmState::Connect | FsmState::Active, BgpEvent::Net(PeerNetEvent::TcpConnValid)) => {
                if self.connection.adopt_incoming() {
                    self.stop_connect_retry();
                    FsmState::OpenSent
                } else {
                    old_state
                }
            }
            (FsmState::Connect, BgpEvent::ConnectRetryTimerExpires) => {
                self.start_connect_retry();
                self.initiate_connect();
                FsmState::Connect
            }
            (FsmState::Connect, BgpEvent::Net(PeerNetEvent::TcpConnFail)) => {
                self.connection.disconnect();
                self.start_connect_retry();
                FsmState::Active
            }
            (FsmState::Active, BgpEvent::ConnectRetryTimerExpires) => {
                self.start_connect_retry();
                self.initiate_connect();
                FsmState::Connect
            }
            (FsmState::Active, BgpEvent::Net(PeerNetEvent::TcpConnFail)) => {
                self.connection_failed()
            }
            (FsmState::Connect | FsmState::Active, _) => old_state,

            (FsmState::OpenSent, BgpEvent::Net(PeerNetEvent::TcpConnFail)) => {
                self.connection.disconnect();
                self.start_connect_retry();
                FsmState::Active
            }
            (FsmState::OpenConfirm | FsmState::Established, BgpEvent::Net(PeerNetEvent::TcpConnFail)) => {
                self.connection_failed()
            }
            (_, BgpEvent::Net(PeerNetEvent::TcpConnValid)) => {
                debug!(
                    "[{}] {} connection(s) queued for collision resolution",
                    self.peer(),
                    self.connection.incoming().len()
                );
                old_state
            }
            (_, _) => old_state,
        };
        self.transition(old_state, new_state, event, session);
        new_state
    }

    fn transition(
        &mut self,
        old_state: FsmState,
        new_state: FsmState,
        event: BgpEvent,
        session: Option<SessionInfo>,
    ) {
        self.state = new_state;
        self.last_session = self.session_info();
        if old_state == new_state {
            return;
        }
        if self.debug.is_on(DebugFlags::FSM) {
            debug!("[{}] {old_state} -> {new_state} on {event}", self.peer());
        }
        if let (Some(dumps), Some(session)) = (&self.dumps, self.session_info().or(session)) {
            dumps.state_change(session, old_state.mrt_code(), new_state.mrt_code());
        }
    }

    fn record_message(&self, direction: Direction, message: Bytes) {
        self.debug.log_message(self.peer(), direction, &message);
        if let (Some(dumps), Some(session)) = (&self.dumps, self.session_info()) {
            dumps.message(session, message);
        }
    }

    /// Report a message read from the session
    pub fn message_received(&self, message: Bytes) {
        self.record_message(Direction::Received, message);
    }

    /// Report a message written to the session
    pub fn message_sent(&self, message: Bytes) {
        self.record_message(Direction::Sent, message);
    }

    /// Drive the FSM until the peer is shut down or every handle is gone
    pub async fn run(mut self) -> FsmState {
        info!("[{}] peer started", self.peer());
        loop {
            while let Some(event) = self.pending.pop_front() {
                self.handle_event(event);
            }
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.pending.push_back(event),
                    None => break,
                },
                input = self.connection.next_input() => match input {
                    ConnectionInput::Net(event) => self.pending.push_back(event.into()),
                    ConnectionInput::Message(message) => self.message_received(message),
                },
                _ = wait_for(self.connect_retry_deadline) => {
                    self.connect_retry_deadline = None;
                    self.pending.push_back(BgpEvent::ConnectRetryTimerExpires);
                }
            }
        }
        self.connection.disconnect();
        info!("[{}] peer stopped in state {}", self.peer(), self.state);
        self.state
    }
}
