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


use std::fmt::{Display, Formatter};

/// Outcomes of the peer socket layer, each one is fed to the FSM of the
/// owning peer in the order it was raised.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, strum_macros::Display)]
pub enum PeerNetEvent {
    /// **Event 17:** the outbound TCP connection completed.
    ///
    /// **Status:** Mandatory
    TcpConnConfirmed,

    /// **Event 18:** the connection attempt failed or the established
    /// connection went down.
    ///
    /// **Status:** Mandatory
    TcpConnFail,

    /// **Event 14:** a TCP connection from a configured peer was accepted
    /// and queued on that peer's incoming FIFO.
    ///
    /// **Status:** Optional
    TcpConnValid,
}

/// FSM input events
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BgpEvent {
    /// **Event 1:** Local system administrator manually starts the peer
    /// connection.
    ManualStart,

    /// **Event 2:** Local system administrator manually stops the peer
    /// connection.
    ManualStop,

    /// **Event 3:** Local system automatically starts the BGP connection.
    AutomaticStart,

    /// **Event 4:** Manual start with the peer listening before it
    /// connects.
    ManualStartWithPassiveTcp,

    /// **Event 9:** ConnectRetryTimer_Expires
    ConnectRetryTimerExpires,

    Net(PeerNetEvent),
}

impl From<PeerNetEvent> for BgpEvent {
    fn from(value: PeerNetEvent) -> Self {
        BgpEvent::Net(value)
    }
}

impl Display for BgpEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BgpEvent::ManualStart => write!(f, "ManualStart"),
            BgpEvent::ManualStop => write!(f, "ManualStop"),
            BgpEvent::AutomaticStart => write!(f, "AutomaticStart"),
            BgpEvent::ManualStartWithPassiveTcp => write!(f, "ManualStartWithPassiveTcp"),
            BgpEvent::ConnectRetryTimerExpires => write!(f, "ConnectRetryTimerExpires"),
            BgpEvent::Net(event) => write!(f, "{event}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        assert_eq!(PeerNetEvent::TcpConnValid.to_string(), "TcpConnValid");
        assert_eq!(
            BgpEvent::from(PeerNetEvent::TcpConnFail).to_string(),
            "TcpConnFail"
        );
        assert_eq!(BgpEvent::ManualStart.to_string(), "ManualStart");
    }
}
