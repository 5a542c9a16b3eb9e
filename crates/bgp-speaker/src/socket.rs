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


//! Socket level plumbing of a peer: option setup, source address selection
//! and the mapping of socket status codes onto [`PeerNetEvent`].

use crate::events::PeerNetEvent;
use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    fmt::{Display, Formatter},
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs},
};
use tracing::{debug, info, warn};

pub const BGP_PORT: u16 = 179;

/// Default TTL of single hop external sessions
pub const EBGP_DEFAULT_TTL: u8 = 1;

/// Default TTL (hop limit) of internal sessions
pub const IBGP_DEFAULT_TTL: u8 = 255;

pub(crate) const LISTEN_BACKLOG: i32 = 3;

/// Per peer socket settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeerSocketConfig {
    pub remote: SocketAddr,
    pub local_as: u32,
    pub remote_as: u32,
    pub ttl: Option<u8>,
    /// TCP MD5 signature key (RFC2385)
    pub password: Option<String>,
    pub update_source: Option<IpAddr>,
    /// Takes precedence over `update_source`
    pub update_interface: Option<String>,
    pub source_port: Option<u16>,
    /// Device of the routing table the session is bound to
    pub vrf: Option<String>,
    /// Session ASNs are four octets wide (RFC6793)
    #[serde(default)]
    pub four_octet_asn: bool,
}

impl PeerSocketConfig {
    pub fn new(remote: SocketAddr, local_as: u32, remote_as: u32) -> Self {
        Self {
            remote,
            local_as,
            remote_as,
            ttl: None,
            password: None,
            update_source: None,
            update_interface: None,
            source_port: None,
            vrf: None,
            four_octet_asn: false,
        }
    }

    pub const fn is_external(&self) -> bool {
        self.local_as != self.remote_as
    }

    /// TTL set on the socket, internal sessions without a configured TTL
    /// keep the system default
    pub fn socket_ttl(&self) -> Option<u8> {
        if self.is_external() || self.ttl.is_some() {
            Some(self.effective_ttl())
        } else {
            None
        }
    }

    pub fn effective_ttl(&self) -> u8 {
        match self.ttl {
            Some(ttl) => ttl,
            None if self.is_external() => EBGP_DEFAULT_TTL,
            None => IBGP_DEFAULT_TTL,
        }
    }
}

/// Socket errors that end a connection attempt
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SocketFailure {
    Fault,
    InvalidArgument,
    BadDescriptor,
    IsDirectory,
    Io,
    NotConnected,
    Other(Option<i32>),
}

impl SocketFailure {
    pub fn classify(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EFAULT) => Self::Fault,
            Some(libc::EINVAL) => Self::InvalidArgument,
            Some(libc::EBADF) => Self::BadDescriptor,
            Some(libc::EISDIR) => Self::IsDirectory,
            Some(libc::EIO) => Self::Io,
            Some(libc::ENOTCONN) => Self::NotConnected,
            code => Self::Other(code),
        }
    }
}

impl Display for SocketFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fault => write!(f, "EFAULT"),
            Self::InvalidArgument => write!(f, "EINVAL"),
            Self::BadDescriptor => write!(f, "EBADF"),
            Self::IsDirectory => write!(f, "EISDIR"),
            Self::Io => write!(f, "EIO"),
            Self::NotConnected => write!(f, "ENOTCONN"),
            Self::Other(Some(code)) => write!(f, "errno {code}"),
            Self::Other(None) => write!(f, "unknown error"),
        }
    }
}

/// Translate the completion status of a connect into exactly one event
pub fn socket_status_event(peer: SocketAddr, status: Result<(), &io::Error>) -> PeerNetEvent {
    match status {
        Ok(()) => {
            debug!("[{peer}] connection established");
            PeerNetEvent::TcpConnConfirmed
        }
        Err(err) => {
            match SocketFailure::classify(err) {
                SocketFailure::Other(_) => {
                    warn!("[{peer}] unexpected socket status: {err}")
                }
                failure => info!("[{peer}] connection failed with {failure}: {err}"),
            }
            PeerNetEvent::TcpConnFail
        }
    }
}

/// Looks up the addresses configured on local interfaces
pub trait InterfaceResolver: Send + Sync {
    /// First address of the requested family on interface `name`
    fn interface_address(&self, name: &str, ipv4: bool) -> io::Result<Option<IpAddr>>;
}

/// [`InterfaceResolver`] backed by the operating system interface list
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemInterfaceResolver;

impl InterfaceResolver for SystemInterfaceResolver {
    fn interface_address(&self, name: &str, ipv4: bool) -> io::Result<Option<IpAddr>> {
        let interfaces = NetworkInterface::show().map_err(io::Error::other)?;
        let address = interfaces
            .iter()
            .filter(|interface| interface.name == name)
            .flat_map(|interface| interface.addr.iter())
            .map(|addr| match addr {
                Addr::V4(addr) => IpAddr::V4(addr.ip),
                Addr::V6(addr) => IpAddr::V6(addr.ip),
            })
            .find(|addr| addr.is_ipv4() == ipv4);
        Ok(address)
    }
}

/// Local address the peer socket binds to, `None` leaves it to the OS.
///
/// `update-interface` wins over `update-source`. The port comes from a
/// resolver lookup of the chosen address so it is known before `bind`.
pub fn resolve_source<R: InterfaceResolver>(
    peer: &PeerSocketConfig,
    resolver: &R,
) -> io::Result<Option<SocketAddr>> {
    let ipv4 = peer.remote.is_ipv4();
    let address = if let Some(interface) = &peer.update_interface {
        resolver
            .interface_address(interface, ipv4)?
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no usable address on interface {interface}"),
                )
            })?
    } else if let Some(source) = peer.update_source {
        source
    } else if peer.source_port.is_some() {
        if ipv4 {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }
    } else {
        return Ok(None);
    };
    if address.is_ipv4() != ipv4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("source {address} does not match the family of {}", peer.remote),
        ));
    }
    let port = peer.source_port.unwrap_or(0);
    let source = (address, port)
        .to_socket_addrs()?
        .find(|candidate| candidate.is_ipv4() == ipv4)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("cannot resolve source {address}"),
            )
        })?;
    Ok(Some(source))
}

fn set_ttl(socket: &Socket, ipv4: bool, ttl: u8) -> io::Result<()> {
    if ipv4 {
        socket.set_ttl(u32::from(ttl))
    } else {
        socket.set_unicast_hops_v6(u32::from(ttl))
    }
}

#[cfg(target_os = "linux")]
fn bind_device(socket: &Socket, device: &str) -> io::Result<()> {
    socket.bind_device(Some(device.as_bytes()))
}

#[cfg(not(target_os = "linux"))]
fn bind_device(_socket: &Socket, device: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("binding to device {device} is not supported on this platform"),
    ))
}

#[cfg(target_os = "linux")]
mod md5 {
    use std::{
        io,
        mem::{size_of, zeroed},
        net::IpAddr,
        os::fd::AsRawFd,
    };

    const TCP_MD5SIG: libc::c_int = 14;
    pub(super) const TCP_MD5SIG_MAXKEYLEN: usize = 80;

    /// `struct tcp_md5sig` of linux/tcp.h
    #[repr(C)]
    struct TcpMd5Sig {
        addr: libc::sockaddr_storage,
        flags: u8,
        prefix_len: u8,
        key_len: u16,
        if_index: u32,
        key: [u8; TCP_MD5SIG_MAXKEYLEN],
    }

    fn peer_storage(peer: IpAddr) -> libc::sockaddr_storage {
        // SAFETY: sockaddr_storage is plain old data, all zeroes is valid
        let mut storage: libc::sockaddr_storage = unsafe { zeroed() };
        match peer {
            IpAddr::V4(addr) => {
                let sin = (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in>();
                // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in
                unsafe {
                    (*sin).sin_family = libc::AF_INET as libc::sa_family_t;
                    (*sin).sin_addr = libc::in_addr {
                        s_addr: u32::from_ne_bytes(addr.octets()),
                    };
                }
            }
            IpAddr::V6(addr) => {
                let sin6 =
                    (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in6>();
                // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in6
                unsafe {
                    (*sin6).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                    (*sin6).sin6_addr = libc::in6_addr {
                        s6_addr: addr.octets(),
                    };
                }
            }
        }
        storage
    }

    /// Install (or with an empty key remove) the signature key for `peer`
    pub(super) fn set_md5_signature<S: AsRawFd>(
        socket: &S,
        peer: IpAddr,
        key: &[u8],
    ) -> io::Result<()> {
        let mut sig = TcpMd5Sig {
            addr: peer_storage(peer),
            flags: 0,
            prefix_len: 0,
            key_len: key.len() as u16,
            if_index: 0,
            key: [0; TCP_MD5SIG_MAXKEYLEN],
        };
        sig.key[..key.len()].copy_from_slice(key);
        // SAFETY: the option value points at a live, fully initialized struct
        // of the size passed along
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::IPPROTO_TCP,
                TCP_MD5SIG,
                (&sig as *const TcpMd5Sig).cast::<libc::c_void>(),
                size_of::<TcpMd5Sig>() as libc::socklen_t,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Set the RFC2385 signature key used for segments exchanged with `peer`.
/// An empty key removes it.
#[cfg(target_os = "linux")]
pub fn set_md5_signature(socket: &Socket, peer: IpAddr, key: &str) -> io::Result<()> {
    if key.len() > md5::TCP_MD5SIG_MAXKEYLEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "MD5 key is longer than {} octets",
                md5::TCP_MD5SIG_MAXKEYLEN
            ),
        ));
    }
    md5::set_md5_signature(socket, peer, key.as_bytes())
}

#[cfg(not(target_os = "linux"))]
pub fn set_md5_signature(_socket: &Socket, peer: IpAddr, _key: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("TCP MD5 signatures for {peer} are not supported on this platform"),
    ))
}

/// Build the non-blocking socket of an outbound connection attempt with
/// every configured option applied and the source address bound.
pub fn open_peer_socket<R: InterfaceResolver>(
    peer: &PeerSocketConfig,
    resolver: &R,
) -> io::Result<Socket> {
    let ipv4 = peer.remote.is_ipv4();
    let socket = Socket::new(
        Domain::for_address(peer.remote),
        Type::STREAM,
        Some(Protocol::TCP),
    )?;
    #[cfg(unix)]
    socket.set_cloexec(true)?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    if let Some(ttl) = peer.socket_ttl() {
        set_ttl(&socket, ipv4, ttl)?;
    }
    if let Some(password) = &peer.password {
        set_md5_signature(&socket, peer.remote.ip(), password)?;
    }
    if let Some(vrf) = &peer.vrf {
        bind_device(&socket, vrf)?;
    }
    if let Some(source) = resolve_source(peer, resolver)? {
        socket.bind(&SockAddr::from(source))?;
        let bound = socket.local_addr()?.as_socket();
        debug!("[{}] bound to {bound:?}", peer.remote);
    }
    Ok(socket)
}

/// Non-blocking listening socket, IPv6 sockets only accept IPv6
pub fn open_listen_socket(local: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(local), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(unix)]
    socket.set_cloexec(true)?;
    socket.set_reuse_address(true)?;
    if local.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&SockAddr::from(local))?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StaticResolver(HashMap<String, Vec<IpAddr>>);

    impl InterfaceResolver for StaticResolver {
        fn interface_address(&self, name: &str, ipv4: bool) -> io::Result<Option<IpAddr>> {
            Ok(self
                .0
                .get(name)
                .and_then(|addrs| addrs.iter().find(|addr| addr.is_ipv4() == ipv4).copied()))
        }
    }

    fn peer() -> PeerSocketConfig {
        PeerSocketConfig::new("192.0.2.1:179".parse().unwrap(), 65000, 65001)
    }

    #[test]
    fn test_status_ok() {
        assert_eq!(
            socket_status_event(peer().remote, Ok(())),
            PeerNetEvent::TcpConnConfirmed
        );
    }

    #[rstest]
    #[case(libc::EFAULT, SocketFailure::Fault)]
    #[case(libc::EINVAL, SocketFailure::InvalidArgument)]
    #[case(libc::EBADF, SocketFailure::BadDescriptor)]
    #[case(libc::EISDIR, SocketFailure::IsDirectory)]
    #[case(libc::EIO, SocketFailure::Io)]
    #[case(libc::ENOTCONN, SocketFailure::NotConnected)]
    #[case(libc::ECONNREFUSED, SocketFailure::Other(Some(libc::ECONNREFUSED)))]
    #[case(libc::ETIMEDOUT, SocketFailure::Other(Some(libc::ETIMEDOUT)))]
    fn test_status_failure(#[case] code: i32, #[case] failure: SocketFailure) {
        let err = io::Error::from_raw_os_error(code);
        assert_eq!(SocketFailure::classify(&err), failure);
        assert_eq!(
            socket_status_event(peer().remote, Err(&err)),
            PeerNetEvent::TcpConnFail
        );
    }

    #[test]
    fn test_status_without_os_code() {
        let err = io::Error::new(io::ErrorKind::Other, "closed");
        assert_eq!(
            socket_status_event(peer().remote, Err(&err)),
            PeerNetEvent::TcpConnFail
        );
    }

    #[rstest]
    #[case(65000, 65001, None, EBGP_DEFAULT_TTL)]
    #[case(65000, 65000, None, IBGP_DEFAULT_TTL)]
    #[case(65000, 65001, Some(5), 5)]
    fn test_effective_ttl(
        #[case] local_as: u32,
        #[case] remote_as: u32,
        #[case] ttl: Option<u8>,
        #[case] expected: u8,
    ) {
        let mut peer = PeerSocketConfig::new("192.0.2.1:179".parse().unwrap(), local_as, remote_as);
        peer.ttl = ttl;
        assert_eq!(peer.effective_ttl(), expected);
    }

    #[test]
    fn test_resolve_source_default() {
        assert_eq!(resolve_source(&peer(), &StaticResolver::default()).unwrap(), None);
    }

    #[test]
    fn test_resolve_source_precedence() {
        let mut resolver = StaticResolver::default();
        resolver.0.insert(
            "eth0".to_string(),
            vec!["2001:db8::1".parse().unwrap(), "198.51.100.7".parse().unwrap()],
        );
        let mut peer = peer();
        peer.update_source = Some("203.0.113.9".parse().unwrap());
        assert_eq!(
            resolve_source(&peer, &resolver).unwrap(),
            Some("203.0.113.9:0".parse().unwrap())
        );
        peer.update_interface = Some("eth0".to_string());
        peer.source_port = Some(1790);
        assert_eq!(
            resolve_source(&peer, &resolver).unwrap(),
            Some("198.51.100.7:1790".parse().unwrap())
        );
        peer.update_interface = Some("eth1".to_string());
        assert_eq!(
            resolve_source(&peer, &resolver).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_resolve_source_port_only() {
        let mut peer = peer();
        peer.source_port = Some(2000);
        assert_eq!(
            resolve_source(&peer, &StaticResolver::default()).unwrap(),
            Some("0.0.0.0:2000".parse().unwrap())
        );
    }

    #[test]
    fn test_resolve_source_family_mismatch() {
        let mut peer = peer();
        peer.update_source = Some("2001:db8::1".parse().unwrap());
        assert_eq!(
            resolve_source(&peer, &StaticResolver::default())
                .unwrap_err()
                .kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_open_listen_socket() {
        let listener = open_listen_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let local = listener.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
        let socket = socket2::SockRef::from(&listener);
        assert!(socket.reuse_address().unwrap());
    }

    #[rstest]
    #[case(65000, 65001, None, Some(EBGP_DEFAULT_TTL))]
    #[case(65000, 65000, None, None)]
    #[case(65000, 65000, Some(10), Some(10))]
    fn test_socket_ttl(
        #[case] local_as: u32,
        #[case] remote_as: u32,
        #[case] ttl: Option<u8>,
        #[case] expected: Option<u8>,
    ) {
        let mut peer = PeerSocketConfig::new("192.0.2.1:179".parse().unwrap(), local_as, remote_as);
        peer.ttl = ttl;
        assert_eq!(peer.socket_ttl(), expected);
    }

    #[test]
    fn test_internal_peer_keeps_system_ttl() {
        let system = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .unwrap()
            .ttl()
            .unwrap();
        let internal = PeerSocketConfig::new("127.0.0.1:179".parse().unwrap(), 65000, 65000);
        let socket = open_peer_socket(&internal, &StaticResolver::default()).unwrap();
        assert_eq!(socket.ttl().unwrap(), system);

        let external = PeerSocketConfig::new("127.0.0.1:179".parse().unwrap(), 65000, 65001);
        let socket = open_peer_socket(&external, &StaticResolver::default()).unwrap();
        assert_eq!(socket.ttl().unwrap(), u32::from(EBGP_DEFAULT_TTL));
    }
}
