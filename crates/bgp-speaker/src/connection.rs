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


//! Per peer socket lifecycle.
//!
//! ```text
//! Idle --connect--> Connecting --status OK--> Connected
//!  ^                    |                        |
//!  +----status error----+-----disconnect/reset---+
//! Idle --incoming accepted--> Connected
//! ```

use crate::{
    codec::BgpFrameCodec,
    events::PeerNetEvent,
    socket::{open_peer_socket, socket_status_event, InterfaceResolver, PeerSocketConfig},
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use socket2::{SockAddr, SockRef};
use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter},
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{io::AsyncReadExt, net::TcpStream};
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display)]
pub enum SocketState {
    Idle,
    Connecting,
    Connected,
}

/// What the socket side produced for the FSM
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConnectionInput {
    Net(PeerNetEvent),
    /// One whole BGP message, header included
    Message(Bytes),
}

#[derive(Debug, Default, Copy, Clone)]
pub struct ConnectionStats {
    attempts: u64,
    failures: u64,
    accepted: u64,
    last_established: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl ConnectionStats {
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    pub const fn failures(&self) -> u64 {
        self.failures
    }

    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    pub const fn last_established(&self) -> Option<DateTime<Utc>> {
        self.last_established
    }

    pub const fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.last_failure
    }
}

/// A TCP connection accepted on a listening socket for a configured peer
#[derive(Debug)]
pub struct IncomingConnection {
    pub stream: TcpStream,
    pub remote: SocketAddr,
}

/// FIFO of accepted connections waiting for the peer FSM, shared between
/// the listener and the peer that owns it.
#[derive(Debug, Clone, Default)]
pub struct IncomingQueue {
    inner: Arc<Mutex<VecDeque<IncomingConnection>>>,
}

impl IncomingQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<IncomingConnection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, connection: IncomingConnection) -> PeerNetEvent {
        self.lock().push_back(connection);
        PeerNetEvent::TcpConnValid
    }

    pub fn pop(&self) -> Option<IncomingConnection> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Socket side of a peer. Operations return the [`PeerNetEvent`] they
/// produce instead of driving the FSM themselves.
pub struct PeerConnection<R> {
    config: PeerSocketConfig,
    resolver: R,
    state: SocketState,
    stream: Option<TcpStream>,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    incoming: IncomingQueue,
    read_buf: BytesMut,
    stats: ConnectionStats,
}

impl<R> Debug for PeerConnection<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("peer", &self.config.remote)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("incoming", &self.incoming.len())
            .finish()
    }
}

impl<R: InterfaceResolver> PeerConnection<R> {
    pub fn new(config: PeerSocketConfig, resolver: R, incoming: IncomingQueue) -> Self {
        Self {
            config,
            resolver,
            state: SocketState::Idle,
            stream: None,
            local_addr: None,
            remote_addr: None,
            incoming,
            read_buf: BytesMut::new(),
            stats: ConnectionStats::default(),
        }
    }

    pub const fn config(&self) -> &PeerSocketConfig {
        &self.config
    }

    pub const fn state(&self) -> SocketState {
        self.state
    }

    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub const fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub const fn incoming(&self) -> &IncomingQueue {
        &self.incoming
    }

    /// The connected stream, present only in [`SocketState::Connected`]
    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        match self.state {
            SocketState::Connected => self.stream.as_mut(),
            SocketState::Idle | SocketState::Connecting => None,
        }
    }

    fn fail(&mut self, err: &io::Error) -> PeerNetEvent {
        self.stats.failures += 1;
        self.stats.last_failure = Some(Utc::now());
        self.disconnect();
        socket_status_event(self.config.remote, Err(err))
    }

    /// Start a non-blocking connect. Returns `TcpConnFail` when the attempt
    /// fails right away, otherwise the outcome is reported by
    /// [`Self::wait_connected`].
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(&mut self) -> Option<PeerNetEvent> {
        self.disconnect();
        self.stats.attempts += 1;
        let peer = self.config.remote;
        let socket = match open_peer_socket(&self.config, &self.resolver) {
            Ok(socket) => socket,
            Err(err) => {
                warn!("[{peer}] cannot set up socket: {err}");
                return Some(self.fail(&err));
            }
        };
        match socket.connect(&SockAddr::from(peer)) {
            Ok(()) => {}
            Err(err)
                if err.raw_os_error() == Some(libc::EINPROGRESS)
                    || err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Some(self.fail(&err)),
        }
        match TcpStream::from_std(socket.into()) {
            Ok(stream) => {
                debug!("[{peer}] connecting");
                self.stream = Some(stream);
                self.state = SocketState::Connecting;
                None
            }
            Err(err) => Some(self.fail(&err)),
        }
    }

    /// Wait for a pending connect to complete, never resolves when no
    /// connect is in progress.
    pub async fn wait_connected(&mut self) -> PeerNetEvent {
        let status = match (&self.state, self.stream.as_ref()) {
            (SocketState::Connecting, Some(stream)) => match stream.writable().await {
                Ok(()) => match stream.take_error() {
                    Ok(None) => stream.peer_addr().map(|_| ()),
                    Ok(Some(err)) | Err(err) => Err(err),
                },
                Err(err) => Err(err),
            },
            _ => std::future::pending().await,
        };
        self.on_socket_status(status)
    }

    /// Read the next whole message from the connected stream, never resolves
    /// while not connected. The peer closing the stream, a read error or a
    /// framing error closes the connection and yields `TcpConnFail`.
    pub async fn read_message(&mut self) -> Result<Bytes, PeerNetEvent> {
        loop {
            match BgpFrameCodec.decode(&mut self.read_buf) {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(err) => {
                    warn!("[{}] {err}", self.config.remote);
                    return Err(self.fail(&err.into()));
                }
            }
            let read = match (self.state, self.stream.as_mut()) {
                (SocketState::Connected, Some(stream)) => stream.read_buf(&mut self.read_buf).await,
                _ => std::future::pending().await,
            };
            match read {
                Ok(0) => {
                    info!("[{}] connection closed by peer", self.config.remote);
                    return Err(self.fail(&io::Error::from(io::ErrorKind::UnexpectedEof)));
                }
                Ok(_) => {}
                Err(err) => return Err(self.fail(&err)),
            }
        }
    }

    /// Next outcome of the socket: the completion of a pending connect, or
    /// a message or failure on the connected stream
    pub async fn next_input(&mut self) -> ConnectionInput {
        match self.state {
            SocketState::Connecting => ConnectionInput::Net(self.wait_connected().await),
            SocketState::Connected => match self.read_message().await {
                Ok(message) => ConnectionInput::Message(message),
                Err(event) => ConnectionInput::Net(event),
            },
            SocketState::Idle => std::future::pending().await,
        }
    }

    /// Apply the completion status of a connect attempt
    pub fn on_socket_status(&mut self, status: io::Result<()>) -> PeerNetEvent {
        if let Err(err) = &status {
            return self.fail(err);
        }
        let event = socket_status_event(self.config.remote, Ok(()));
        if let Some(stream) = &self.stream {
            self.local_addr = stream.local_addr().ok();
            self.remote_addr = stream.peer_addr().ok();
        }
        self.state = SocketState::Connected;
        self.stats.last_established = Some(Utc::now());
        event
    }

    /// Take the oldest accepted connection from the incoming FIFO and make it
    /// the session connection, dropping any outbound attempt.
    pub fn adopt_incoming(&mut self) -> bool {
        let Some(incoming) = self.incoming.pop() else {
            return false;
        };
        self.disconnect();
        info!("[{}] using incoming connection from {}", self.config.remote, incoming.remote);
        self.local_addr = incoming.stream.local_addr().ok();
        self.remote_addr = Some(incoming.remote);
        self.stream = Some(incoming.stream);
        self.state = SocketState::Connected;
        self.stats.accepted += 1;
        self.stats.last_established = Some(Utc::now());
        true
    }

    /// Close the connection and forget the cached addresses
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("[{}] connection closed", self.config.remote);
        }
        self.local_addr = None;
        self.remote_addr = None;
        self.read_buf.clear();
        self.state = SocketState::Idle;
    }

    /// Abort the connection with a RST instead of an orderly close and drop
    /// the connections still queued on the incoming FIFO.
    pub fn reset(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = SockRef::from(stream).set_linger(Some(Duration::ZERO)) {
                warn!("[{}] cannot reset connection: {err}", self.config.remote);
            }
        }
        self.incoming.clear();
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SystemInterfaceResolver;
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    fn peer(remote: SocketAddr) -> PeerSocketConfig {
        let mut config = PeerSocketConfig::new(remote, 65000, 65000);
        config.ttl = Some(64);
        config
    }

    #[tokio::test]
    async fn test_connect_confirmed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let mut connection =
            PeerConnection::new(peer(remote), SystemInterfaceResolver, IncomingQueue::default());
        assert_eq!(connection.connect(), None);
        assert_eq!(connection.state(), SocketState::Connecting);
        let (accepted, _) = listener.accept().await.unwrap();
        assert_eq!(connection.wait_connected().await, PeerNetEvent::TcpConnConfirmed);
        assert_eq!(connection.state(), SocketState::Connected);
        assert_eq!(connection.remote_addr(), Some(remote));
        assert_eq!(connection.local_addr(), accepted.peer_addr().ok());
        assert!(connection.stream_mut().is_some());

        connection.disconnect();
        assert_eq!(connection.state(), SocketState::Idle);
        assert_eq!(connection.local_addr(), None);
        assert_eq!(connection.remote_addr(), None);
        assert_eq!(connection.stats().attempts(), 1);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        drop(listener);
        let mut connection =
            PeerConnection::new(peer(remote), SystemInterfaceResolver, IncomingQueue::default());
        let event = match connection.connect() {
            Some(event) => event,
            None => connection.wait_connected().await,
        };
        assert_eq!(event, PeerNetEvent::TcpConnFail);
        assert_eq!(connection.state(), SocketState::Idle);
        assert_eq!(connection.stats().failures(), 1);
    }

    #[tokio::test]
    async fn test_status_error_after_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let mut connection =
            PeerConnection::new(peer(remote), SystemInterfaceResolver, IncomingQueue::default());
        assert_eq!(connection.connect(), None);
        let event = connection.on_socket_status(Err(io::Error::from_raw_os_error(libc::EIO)));
        assert_eq!(event, PeerNetEvent::TcpConnFail);
        assert_eq!(connection.state(), SocketState::Idle);
    }

    #[tokio::test]
    async fn test_incoming_fifo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();
        let queue = IncomingQueue::default();
        let first = TcpStream::connect(local).await.unwrap();
        let second = TcpStream::connect(local).await.unwrap();
        for _ in 0..2 {
            let (stream, remote) = listener.accept().await.unwrap();
            assert_eq!(
                queue.push(IncomingConnection { stream, remote }),
                PeerNetEvent::TcpConnValid
            );
        }
        assert_eq!(queue.len(), 2);

        let mut connection =
            PeerConnection::new(peer(local), SystemInterfaceResolver, queue.clone());
        assert!(connection.adopt_incoming());
        assert_eq!(connection.remote_addr(), first.local_addr().ok());
        assert_eq!(connection.state(), SocketState::Connected);
        assert_eq!(queue.len(), 1);

        connection.reset();
        assert!(queue.is_empty());
        assert_eq!(connection.state(), SocketState::Idle);
        assert!(!connection.adopt_incoming());
        drop(second);
    }

    #[tokio::test]
    async fn test_read_messages_until_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let mut connection =
            PeerConnection::new(peer(remote), SystemInterfaceResolver, IncomingQueue::default());
        assert_eq!(connection.connect(), None);
        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(
            connection.next_input().await,
            ConnectionInput::Net(PeerNetEvent::TcpConnConfirmed)
        );

        let mut keepalive = vec![0xff; 16];
        keepalive.extend_from_slice(&[0x00, 0x13, 0x04]);
        server.write_all(&keepalive[..7]).await.unwrap();
        server.flush().await.unwrap();
        server.write_all(&keepalive[7..]).await.unwrap();
        server.write_all(&keepalive).await.unwrap();
        assert_eq!(
            connection.next_input().await,
            ConnectionInput::Message(Bytes::from(keepalive.clone()))
        );
        assert_eq!(
            connection.next_input().await,
            ConnectionInput::Message(Bytes::from(keepalive))
        );

        drop(server);
        assert_eq!(
            connection.next_input().await,
            ConnectionInput::Net(PeerNetEvent::TcpConnFail)
        );
        assert_eq!(connection.state(), SocketState::Idle);
        assert_eq!(connection.stats().failures(), 1);
    }

    #[tokio::test]
    async fn test_read_bad_marker_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let mut connection =
            PeerConnection::new(peer(remote), SystemInterfaceResolver, IncomingQueue::default());
        assert_eq!(connection.connect(), None);
        let (mut server, _) = listener.accept().await.unwrap();
        connection.wait_connected().await;
        server.write_all(&[0u8; 19]).await.unwrap();
        assert_eq!(connection.read_message().await, Err(PeerNetEvent::TcpConnFail));
        assert_eq!(connection.state(), SocketState::Idle);
    }
}
