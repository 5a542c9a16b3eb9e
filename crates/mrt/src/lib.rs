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


//! MRT export of BGP sessions: record encoding and the dump files configured
//! with `dump bgp (all|updates|routes-mrt) PATH [INTERVAL]`.

pub mod dump;
pub mod interval;
pub mod record;

pub use dump::{DumpConfig, DumpError, DumpEvent, DumpKind, DumpManager, DumpRoute, RouteSource};
pub use interval::{parse_interval, IntervalError};
pub use record::{MrtRecord, MrtWritingError, SessionInfo, TableDumpEntry};
