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


use crate::{
    connection::IncomingConnection,
    events::PeerNetEvent,
    fsm::PeerHandle,
    socket::{open_listen_socket, set_md5_signature, BGP_PORT},
};
use futures::{stream::select_all, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use socket2::SockRef;
use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A modified version of Tokio's TcpListenerStream wrapper that returns the
/// peer socket along the incoming stream
#[derive(Debug)]
pub struct TcpListenerStream {
    inner: TcpListener,
}

impl TcpListenerStream {
    pub fn new(listener: TcpListener) -> Self {
        Self { inner: listener }
    }
}

impl Stream for TcpListenerStream {
    type Item = io::Result<(TcpStream, SocketAddr)>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.poll_accept(cx) {
            Poll::Ready(Ok((stream, socket))) => Poll::Ready(Some(Ok((stream, socket)))),
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Address families the daemon runs with, decided once at startup
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddressFamilies {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl Default for AddressFamilies {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
        }
    }
}

impl AddressFamilies {
    pub const fn supports(&self, address: &IpAddr) -> bool {
        match address {
            IpAddr::V4(_) => self.ipv4,
            IpAddr::V6(_) => self.ipv6,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ListenConfig {
    pub port: u16,
    /// Wildcard addresses of every enabled family when empty
    pub addresses: Vec<IpAddr>,
    pub families: AddressFamilies,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: BGP_PORT,
            addresses: vec![],
            families: AddressFamilies::default(),
        }
    }
}

impl ListenConfig {
    /// One listening socket address per configured address and family
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        let addresses = if self.addresses.is_empty() {
            vec![
                IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ]
        } else {
            self.addresses.clone()
        };
        addresses
            .into_iter()
            .filter(|address| self.families.supports(address))
            .map(|address| SocketAddr::new(address, self.port))
            .collect()
    }
}

/// Configured peers indexed by their address
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<Mutex<HashMap<IpAddr, PeerHandle>>>,
}

impl PeerRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, PeerHandle>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, handle: PeerHandle) -> Option<PeerHandle> {
        self.lock().insert(handle.peer().ip().to_canonical(), handle)
    }

    pub fn unregister(&self, address: &IpAddr) -> Option<PeerHandle> {
        self.lock().remove(&address.to_canonical())
    }

    pub fn get(&self, address: &IpAddr) -> Option<PeerHandle> {
        self.lock().get(&address.to_canonical()).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Hand an accepted connection to its peer. Connections from unknown
    /// addresses are closed, that is not an error.
    pub fn accept(&self, stream: TcpStream, remote: SocketAddr) -> Option<PeerNetEvent> {
        match self.get(&remote.ip()) {
            Some(handle) => {
                info!("[{}] accepted connection from {remote}", handle.peer());
                Some(handle.accept(IncomingConnection { stream, remote }))
            }
            None => {
                info!("no peer configured for {remote}, closing connection");
                None
            }
        }
    }
}

/// Listening sockets of the daemon
#[derive(Debug)]
pub struct BgpListener {
    listeners: Vec<TcpListener>,
    registry: PeerRegistry,
    cancel: CancellationToken,
}

impl BgpListener {
    /// Open the listening sockets, one per address family. A socket that
    /// cannot be opened is logged and skipped. Must be called within a tokio
    /// runtime.
    pub fn bind(
        config: &ListenConfig,
        registry: PeerRegistry,
        passwords: &[(IpAddr, String)],
        cancel: CancellationToken,
    ) -> Self {
        let mut listeners = Vec::new();
        for local in config.socket_addrs() {
            let listener = match open_listen_socket(local) {
                Ok(listener) => listener,
                Err(err) => {
                    error!("cannot listen on {local}: {err}");
                    continue;
                }
            };
            for (peer, password) in passwords {
                if peer.is_ipv4() == local.is_ipv4() {
                    if let Err(err) = set_md5_signature(&SockRef::from(&listener), *peer, password)
                    {
                        warn!("[{peer}] cannot set MD5 signature on {local}: {err}");
                    }
                }
            }
            match TcpListener::from_std(listener) {
                Ok(listener) => {
                    info!("listening on {local}");
                    listeners.push(listener);
                }
                Err(err) => error!("cannot register listener {local}: {err}"),
            }
        }
        Self {
            listeners,
            registry,
            cancel,
        }
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect()
    }

    /// Accept connections until cancelled, the listening sockets are closed
    /// on return
    pub async fn run(self) {
        let local_addrs = self.local_addrs();
        let mut incoming = select_all(self.listeners.into_iter().map(TcpListenerStream::new));
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = incoming.next() => match next {
                    Some(Ok((stream, remote))) => {
                        self.registry.accept(stream, remote);
                    }
                    Some(Err(err)) => warn!("accept failed: {err}"),
                    None => break,
                }
            }
        }
        info!("stopped listening on {local_addrs:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        debug::DebugState,
        events::BgpEvent,
        fsm::{FsmState, PeerFsm},
        socket::{PeerSocketConfig, SystemInterfaceResolver},
    };
    use tracing::Instrument;
    use tracing_test::traced_test;

    #[test]
    fn test_socket_addrs() {
        let mut config = ListenConfig::default();
        assert_eq!(
            config.socket_addrs(),
            vec![
                "[::]:179".parse::<SocketAddr>().unwrap(),
                "0.0.0.0:179".parse().unwrap()
            ]
        );
        config.families.ipv6 = false;
        assert_eq!(config.socket_addrs(), vec!["0.0.0.0:179".parse().unwrap()]);
        config.addresses = vec!["2001:db8::1".parse().unwrap(), "192.0.2.1".parse().unwrap()];
        config.port = 1179;
        assert_eq!(config.socket_addrs(), vec!["192.0.2.1:1179".parse().unwrap()]);
    }

    fn loopback_config() -> ListenConfig {
        ListenConfig {
            port: 0,
            addresses: vec!["127.0.0.1".parse().unwrap()],
            families: AddressFamilies::default(),
        }
    }

    #[tokio::test]
    async fn test_accept_configured_peer() {
        let registry = PeerRegistry::default();
        let cancel = CancellationToken::new();
        let listener = BgpListener::bind(&loopback_config(), registry.clone(), &[], cancel.clone());
        let local = listener.local_addrs()[0];

        let peer = PeerSocketConfig::new("127.0.0.1:179".parse().unwrap(), 65000, 65001);
        let (fsm, handle) = PeerFsm::new(
            peer,
            SystemInterfaceResolver,
            Arc::new(DebugState::default()),
            None,
            cancel.child_token(),
        );
        registry.register(handle.clone());
        handle.send(BgpEvent::ManualStartWithPassiveTcp);
        let listen_task = tokio::spawn(listener.run());

        let _client = TcpStream::connect(local).await.unwrap();
        while fsm.connection().incoming().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        drop(handle);
        registry.unregister(&"127.0.0.1".parse().unwrap());
        assert!(registry.is_empty());
        assert_eq!(fsm.run().await, FsmState::OpenSent);

        cancel.cancel();
        listen_task.await.unwrap();
    }

    #[traced_test]
    #[tokio::test]
    async fn test_unknown_peer_closed() {
        let registry = PeerRegistry::default();
        let cancel = CancellationToken::new();
        let listener = BgpListener::bind(&loopback_config(), registry, &[], cancel.clone());
        let local = listener.local_addrs()[0];
        let listen_task = tokio::spawn(listener.run().in_current_span());

        let mut client = TcpStream::connect(local).await.unwrap();
        let mut buf = [0u8; 1];
        let read = tokio::io::AsyncReadExt::read(&mut client, &mut buf).await;
        assert!(matches!(read, Ok(0) | Err(_)));
        assert!(logs_contain("no peer configured for"));

        cancel.cancel();
        listen_task.await.unwrap();
    }
}
