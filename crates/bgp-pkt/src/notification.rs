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


//! BGP NOTIFICATION messages and the text used to log them.
//!
//! Looking up the text never fails: codes outside the known tables map to
//! fixed sentinel strings so a garbled NOTIFICATION can still be logged.

use crate::iana::{
    BgpErrorNotificationCode, CapabilityMessageErrorSubCode, CeaseErrorSubCode,
    FiniteStateMachineErrorSubCode, MessageHeaderErrorSubCode, OpenMessageErrorSubCode,
    UpdateMessageErrorSubCode,
};
use serde::{Deserialize, Serialize};

/// Code text for an error code outside [`BgpErrorNotificationCode`]
pub const UNRECOGNIZED_CODE: &str = "Unrecognized";
/// Subcode text paired with [`UNRECOGNIZED_CODE`]
pub const UNSPECIFIED_SUBCODE: &str = "/Unspecified";
/// Subcode text for a known code with an unknown subcode
pub const UNRECOGNIZED_SUBCODE: &str = "/Unrecognized";
/// Subcode text for subcode zero when the code has no entry for it
pub const UNSPECIFIC_SUBCODE: &str = "/Unspecific";

/// Text of the known subcode, `None` when not in the code's table
fn subcode_text(code: BgpErrorNotificationCode, subcode: u8) -> Option<&'static str> {
    let text: &'static str = match code {
        BgpErrorNotificationCode::MessageHeaderError => {
            MessageHeaderErrorSubCode::try_from(subcode).ok()?.into()
        }
        BgpErrorNotificationCode::OpenMessageError => {
            OpenMessageErrorSubCode::try_from(subcode).ok()?.into()
        }
        BgpErrorNotificationCode::UpdateMessageError => {
            UpdateMessageErrorSubCode::try_from(subcode).ok()?.into()
        }
        BgpErrorNotificationCode::HoldTimerExpired => return None,
        BgpErrorNotificationCode::FiniteStateMachineError => {
            FiniteStateMachineErrorSubCode::try_from(subcode).ok()?.into()
        }
        BgpErrorNotificationCode::Cease => CeaseErrorSubCode::try_from(subcode).ok()?.into(),
        BgpErrorNotificationCode::CapabilityMessageError => {
            CapabilityMessageErrorSubCode::try_from(subcode).ok()?.into()
        }
    };
    Some(text)
}

/// Operator text for an error code and subcode.
///
/// The subcode text is prefixed with `/` and terminated with `.` so the two
/// can be printed back to back. Hold Timer Expired carries no subcode text.
pub fn decode_error_strings(code: u8, subcode: u8) -> (&'static str, String) {
    let code = match BgpErrorNotificationCode::try_from(code) {
        Ok(code) => code,
        Err(_) => return (UNRECOGNIZED_CODE, UNSPECIFIED_SUBCODE.to_string()),
    };
    let code_text: &'static str = code.into();
    if code == BgpErrorNotificationCode::HoldTimerExpired {
        return (code_text, String::new());
    }
    let subcode_text = match subcode_text(code, subcode) {
        Some(text) => format!("/{text}."),
        None if subcode == 0 => UNSPECIFIC_SUBCODE.to_string(),
        None => UNRECOGNIZED_SUBCODE.to_string(),
    };
    (code_text, subcode_text)
}

/// The (code, subcode, data length) triple of a sent or received
/// NOTIFICATION, kept only long enough to be logged.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NotificationInfo {
    code: u8,
    subcode: u8,
    data_len: usize,
}

impl NotificationInfo {
    pub const fn new(code: u8, subcode: u8, data_len: usize) -> Self {
        Self {
            code,
            subcode,
            data_len,
        }
    }

    pub const fn code(&self) -> u8 {
        self.code
    }

    pub const fn subcode(&self) -> u8 {
        self.subcode
    }

    pub const fn data_len(&self) -> usize {
        self.data_len
    }

    /// `"<code><subcode> <len> bytes"`
    pub fn describe(&self) -> String {
        let (code, subcode) = decode_error_strings(self.code, self.subcode);
        format!("{code}{subcode} {} bytes", self.data_len)
    }
}

impl std::fmt::Display for NotificationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// NOTIFICATION message body
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Error code    | Error subcode |   Data (variable)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Code and subcode are kept raw so that unknown values received from a peer
/// survive a decode and encode cycle.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BgpNotification {
    code: u8,
    subcode: u8,
    data: Vec<u8>,
}

impl BgpNotification {
    pub const fn new(code: u8, subcode: u8, data: Vec<u8>) -> Self {
        Self {
            code,
            subcode,
            data,
        }
    }

    pub fn cease(subcode: CeaseErrorSubCode) -> Self {
        Self::new(BgpErrorNotificationCode::Cease.into(), subcode.into(), vec![])
    }

    pub fn update_error(subcode: UpdateMessageErrorSubCode, data: Vec<u8>) -> Self {
        Self::new(
            BgpErrorNotificationCode::UpdateMessageError.into(),
            subcode.into(),
            data,
        )
    }

    pub fn fsm_error(subcode: FiniteStateMachineErrorSubCode) -> Self {
        Self::new(
            BgpErrorNotificationCode::FiniteStateMachineError.into(),
            subcode.into(),
            vec![],
        )
    }

    pub const fn code(&self) -> u8 {
        self.code
    }

    pub const fn subcode(&self) -> u8 {
        self.subcode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn info(&self) -> NotificationInfo {
        NotificationInfo::new(self.code, self.subcode, self.data.len())
    }
}
