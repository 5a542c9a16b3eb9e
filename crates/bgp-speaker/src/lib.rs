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


//! Peer network I/O of the BGP daemon: socket setup and status mapping,
//! listening sockets with the per peer incoming connection FIFO, the TCP
//! level FSM driver, and the `debug bgp` categories.
//!
//! The socket layer never touches FSM state, every outcome is returned as a
//! [`events::PeerNetEvent`] that the caller queues for the owning peer.

pub mod codec;
pub mod connection;
pub mod debug;
pub mod events;
pub mod fsm;
pub mod listener;
pub mod socket;

pub use codec::{BgpFrameCodec, BgpFramingError};
pub use connection::{
    ConnectionInput, IncomingConnection, IncomingQueue, PeerConnection, SocketState,
};
pub use debug::{DebugFlags, DebugScope, DebugState};
pub use events::{BgpEvent, PeerNetEvent};
pub use fsm::{FsmState, PeerFsm, PeerHandle};
pub use listener::{AddressFamilies, BgpListener, ListenConfig, PeerRegistry};
pub use socket::{InterfaceResolver, PeerSocketConfig, SystemInterfaceResolver};
