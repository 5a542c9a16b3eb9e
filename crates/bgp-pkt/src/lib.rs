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


//! BGP-4 path attribute data representation for the daemon core: extended
//! communities and their intern store, AS paths, the attribute block
//! written to peers and MRT dumps, and NOTIFICATION messages.

pub mod community;
pub mod iana;
pub mod intern;
pub mod notification;
pub mod path_attribute;
pub mod wire;

pub use community::{
    Community, ExtCommunityFormat, ExtCommunityKind, ExtCommunityValue, ExtendedCommunity,
};
pub use intern::{ExtCommunityStore, InternedExtCommunity};
pub use notification::{decode_error_strings, BgpNotification, NotificationInfo};
pub use path_attribute::{AsPath, AsnEncoding, PathAttributes};
