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


//! Runtime `debug bgp` categories.
//!
//! Flags live in two scopes: the config scope is saved with the
//! configuration, the terminal scope lasts for the session only. A category
//! is on when either scope enables it.

use bgpcore_bgp_pkt::{iana::BgpMessageType, wire::BGP_MARKER_LENGTH};
use bitflags::bitflags;
use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU32, Ordering},
};
use tracing::debug;

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct DebugFlags: u32 {
        const EVENTS = 0x01;
        const KEEPALIVES = 0x02;
        const UPDATES_IN = 0x04;
        const UPDATES_OUT = 0x08;
        const FSM = 0x10;
        const FILTERS = 0x20;
        const DAMPENING = 0x40;
        const UPDATES = Self::UPDATES_IN.bits() | Self::UPDATES_OUT.bits();
    }
}

/// Config-write order and keyword of each category
const CATEGORIES: [(DebugFlags, &str); 5] = [
    (DebugFlags::EVENTS, "events"),
    (DebugFlags::KEEPALIVES, "keepalives"),
    (DebugFlags::FSM, "fsm"),
    (DebugFlags::FILTERS, "filters"),
    (DebugFlags::DAMPENING, "dampening"),
];

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum DebugError {
    #[error("unknown debug category: {0}")]
    UnknownCategory(String),
}

impl DebugFlags {
    /// Parse the words following `debug bgp`
    pub fn parse_category(words: &[&str]) -> Result<Self, DebugError> {
        let flags = match words {
            ["events"] => Self::EVENTS,
            ["keepalives"] => Self::KEEPALIVES,
            ["updates"] => Self::UPDATES,
            ["updates", "in"] => Self::UPDATES_IN,
            ["updates", "out"] => Self::UPDATES_OUT,
            ["fsm"] => Self::FSM,
            ["filters"] => Self::FILTERS,
            ["dampening"] => Self::DAMPENING,
            ["all"] => Self::all(),
            _ => return Err(DebugError::UnknownCategory(words.join(" "))),
        };
        Ok(flags)
    }

    /// Category keywords of the set flags, `updates` when both directions
    /// are on
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut keywords = vec![];
        for (flag, keyword) in CATEGORIES {
            if self.contains(flag) {
                keywords.push(keyword);
            }
            if flag == DebugFlags::KEEPALIVES {
                if self.contains(Self::UPDATES) {
                    keywords.push("updates");
                } else if self.contains(Self::UPDATES_IN) {
                    keywords.push("updates in");
                } else if self.contains(Self::UPDATES_OUT) {
                    keywords.push("updates out");
                }
            }
        }
        keywords
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display)]
pub enum DebugScope {
    Config,
    Terminal,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display)]
pub enum Direction {
    #[strum(to_string = "rcvd")]
    Received,
    #[strum(to_string = "send")]
    Sent,
}

#[derive(Debug, Default)]
pub struct DebugState {
    config: AtomicU32,
    terminal: AtomicU32,
}

impl DebugState {
    pub fn enable(&self, scope: DebugScope, flags: DebugFlags) {
        match scope {
            DebugScope::Config => self.config.fetch_or(flags.bits(), Ordering::Relaxed),
            DebugScope::Terminal => self.terminal.fetch_or(flags.bits(), Ordering::Relaxed),
        };
    }

    /// Turning a category off in config scope also turns it off for the
    /// terminal.
    pub fn disable(&self, scope: DebugScope, flags: DebugFlags) {
        if scope == DebugScope::Config {
            self.config.fetch_and(!flags.bits(), Ordering::Relaxed);
        }
        self.terminal.fetch_and(!flags.bits(), Ordering::Relaxed);
    }

    pub fn scope_flags(&self, scope: DebugScope) -> DebugFlags {
        let bits = match scope {
            DebugScope::Config => self.config.load(Ordering::Relaxed),
            DebugScope::Terminal => self.terminal.load(Ordering::Relaxed),
        };
        DebugFlags::from_bits_truncate(bits)
    }

    pub fn flags(&self) -> DebugFlags {
        self.scope_flags(DebugScope::Config) | self.scope_flags(DebugScope::Terminal)
    }

    pub fn is_on(&self, flags: DebugFlags) -> bool {
        self.flags().intersects(flags)
    }

    /// `debug bgp` lines of the config scope
    pub fn config_write(&self) -> String {
        self.scope_flags(DebugScope::Config)
            .keywords()
            .iter()
            .map(|keyword| format!("debug bgp {keyword}\n"))
            .collect()
    }

    /// `show debugging bgp` output
    pub fn show(&self) -> String {
        let mut out = String::from("BGP debugging status:\n");
        for keyword in self.flags().keywords() {
            out.push_str(&format!("  BGP {keyword} debugging is on\n"));
        }
        out
    }

    /// Trace a sent or received message when its category is on
    pub fn log_message(&self, peer: SocketAddr, direction: Direction, message: &[u8]) {
        let message_type = message
            .get(BGP_MARKER_LENGTH + 2)
            .and_then(|code| BgpMessageType::try_from(*code).ok());
        let category = match (message_type, direction) {
            (Some(BgpMessageType::KeepAlive), _) => DebugFlags::KEEPALIVES,
            (Some(BgpMessageType::Update), Direction::Received) => DebugFlags::UPDATES_IN,
            (Some(BgpMessageType::Update), Direction::Sent) => DebugFlags::UPDATES_OUT,
            _ => DebugFlags::EVENTS,
        };
        if self.is_on(category) {
            match message_type {
                Some(message_type) => debug!(
                    "[{peer}] {direction} {message_type} ({} bytes)",
                    message.len()
                ),
                None => debug!("[{peer}] {direction} message ({} bytes)", message.len()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tracing_test::traced_test;

    #[rstest]
    #[case(&["fsm"], DebugFlags::FSM)]
    #[case(&["events"], DebugFlags::EVENTS)]
    #[case(&["filters"], DebugFlags::FILTERS)]
    #[case(&["keepalives"], DebugFlags::KEEPALIVES)]
    #[case(&["updates"], DebugFlags::UPDATES)]
    #[case(&["updates", "in"], DebugFlags::UPDATES_IN)]
    #[case(&["updates", "out"], DebugFlags::UPDATES_OUT)]
    #[case(&["dampening"], DebugFlags::DAMPENING)]
    #[case(&["all"], DebugFlags::all())]
    fn test_parse_category(#[case] words: &[&str], #[case] expected: DebugFlags) {
        assert_eq!(DebugFlags::parse_category(words), Ok(expected));
    }

    #[rstest]
    #[case(&[])]
    #[case(&["zebra"])]
    #[case(&["updates", "sideways"])]
    fn test_parse_unknown(#[case] words: &[&str]) {
        assert!(DebugFlags::parse_category(words).is_err());
    }

    #[test]
    fn test_scopes() {
        let state = DebugState::default();
        state.enable(DebugScope::Terminal, DebugFlags::FSM);
        assert!(state.is_on(DebugFlags::FSM));
        assert_eq!(state.config_write(), "");

        state.enable(DebugScope::Config, DebugFlags::UPDATES_IN | DebugFlags::EVENTS);
        assert_eq!(
            state.config_write(),
            "debug bgp events\ndebug bgp updates in\n"
        );
        state.disable(DebugScope::Terminal, DebugFlags::EVENTS);
        assert!(state.is_on(DebugFlags::EVENTS));

        state.disable(DebugScope::Config, DebugFlags::EVENTS | DebugFlags::FSM);
        assert!(!state.is_on(DebugFlags::EVENTS));
        assert!(!state.is_on(DebugFlags::FSM));
        assert!(state.is_on(DebugFlags::UPDATES));
    }

    #[test]
    fn test_config_write_all() {
        let state = DebugState::default();
        state.enable(DebugScope::Config, DebugFlags::all());
        assert_eq!(
            state.config_write(),
            "debug bgp events\ndebug bgp keepalives\ndebug bgp updates\ndebug bgp fsm\n\
             debug bgp filters\ndebug bgp dampening\n"
        );
        assert!(state.show().contains("  BGP fsm debugging is on\n"));
    }

    #[traced_test]
    #[test]
    fn test_log_message() {
        let peer: SocketAddr = "192.0.2.1:179".parse().unwrap();
        let mut keepalive = vec![0xff; 16];
        keepalive.extend_from_slice(&[0x00, 0x13, 0x04]);
        let state = DebugState::default();
        state.log_message(peer, Direction::Received, &keepalive);
        assert!(!logs_contain("KeepAlive"));

        state.enable(DebugScope::Terminal, DebugFlags::KEEPALIVES);
        state.log_message(peer, Direction::Received, &keepalive);
        assert!(logs_contain("[192.0.2.1:179] rcvd KeepAlive (19 bytes)"));
    }
}
