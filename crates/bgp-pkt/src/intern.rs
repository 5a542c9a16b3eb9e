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


//! Canonicalization table for extended community values.
//!
//! Equal values share one immutable instance. Every [`InternedExtCommunity`]
//! handle holds one reference; cloning takes another and dropping gives it
//! back. The table entry is removed when the last handle goes away.

use crate::community::{
    ExtCommunityKind, ExtCommunityTextError, ExtendedCommunity, ExtendedCommunityError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Table = HashMap<Arc<ExtendedCommunity>, usize>;

/// Shared intern table. Cloning the store gives another view on the same
/// table.
#[derive(Debug, Clone, Default)]
pub struct ExtCommunityStore {
    table: Arc<Mutex<Table>>,
}

impl ExtCommunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        lock_table(&self.table)
    }

    /// Parse the wire payload of an extended communities attribute and
    /// return the canonical instance for it.
    pub fn parse(&self, octets: &[u8]) -> Result<InternedExtCommunity, ExtendedCommunityError> {
        Ok(self.intern(ExtendedCommunity::from_octets(octets)?))
    }

    /// Parse the text form, see [`ExtendedCommunity::parse_text`]
    pub fn parse_text(
        &self,
        text: &str,
        kind: ExtCommunityKind,
        keyword_included: bool,
    ) -> Result<InternedExtCommunity, ExtCommunityTextError> {
        Ok(self.intern(ExtendedCommunity::parse_text(
            text,
            kind,
            keyword_included,
        )?))
    }

    /// Return the canonical instance equal to `value`, making `value` the
    /// canonical one when nothing equal is interned yet.
    pub fn intern(&self, value: ExtendedCommunity) -> InternedExtCommunity {
        let mut table = self.lock();
        let canonical = match table.get_key_value(&value) {
            Some((existing, _)) => Arc::clone(existing),
            None => Arc::new(value),
        };
        *table.entry(Arc::clone(&canonical)).or_insert(0) += 1;
        InternedExtCommunity {
            value: canonical,
            table: Arc::clone(&self.table),
        }
    }

    /// Give back one reference. Same as dropping the handle.
    pub fn release(&self, handle: InternedExtCommunity) {
        drop(handle)
    }

    /// Number of distinct values currently interned
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Outstanding references to the interned value with this wire payload
    pub fn refcount(&self, octets: &[u8]) -> Option<usize> {
        let value = ExtendedCommunity::from_octets(octets).ok()?;
        self.lock().get(&value).copied()
    }
}

fn lock_table(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    // The table is left consistent between statements, a panic elsewhere
    // does not invalidate it
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A counted reference to a canonical [`ExtendedCommunity`]
#[derive(Debug)]
pub struct InternedExtCommunity {
    value: Arc<ExtendedCommunity>,
    table: Arc<Mutex<Table>>,
}

impl InternedExtCommunity {
    /// True when both handles refer to the same canonical instance
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.value, &other.value)
    }

    /// References held on this value across all handles
    pub fn refcount(&self) -> usize {
        lock_table(&self.table)
            .get(self.value.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// A mutable copy, to be edited and interned again
    pub fn to_owned_value(&self) -> ExtendedCommunity {
        self.value.as_ref().clone()
    }
}

impl std::ops::Deref for InternedExtCommunity {
    type Target = ExtendedCommunity;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl Clone for InternedExtCommunity {
    fn clone(&self) -> Self {
        let mut table = lock_table(&self.table);
        if let Some(count) = table.get_mut(self.value.as_ref()) {
            *count += 1;
        }
        Self {
            value: Arc::clone(&self.value),
            table: Arc::clone(&self.table),
        }
    }
}

impl Drop for InternedExtCommunity {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        let remove = match table.get_mut(self.value.as_ref()) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if remove {
            table.remove(self.value.as_ref());
        }
    }
}

/// Canonical instances are unique, so identity is equality
impl PartialEq for InternedExtCommunity {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for InternedExtCommunity {}

impl std::hash::Hash for InternedExtCommunity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl std::fmt::Display for InternedExtCommunity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::ExtCommunityValue;
    use crate::iana::ExtendedCommunitySubType;

    const RT_100_1: [u8; 8] = [0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01];
    const RT_100_2: [u8; 8] = [0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0x02];

    #[test]
    fn test_parse_is_idempotent() {
        let store = ExtCommunityStore::new();
        let bytes = [RT_100_1, RT_100_2].concat();
        assert_eq!(store.refcount(&bytes), None);
        let first = store.parse(&bytes).unwrap();
        let second = store.parse(&bytes).unwrap();
        assert!(InternedExtCommunity::ptr_eq(&first, &second));
        assert_eq!(store.refcount(&bytes), Some(2));
        assert_eq!(store.len(), 1);
        store.release(first);
        assert_eq!(second.refcount(), 1);
        store.release(second);
        assert_eq!(store.refcount(&bytes), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_malformed_length() {
        let store = ExtCommunityStore::new();
        assert_eq!(
            store.parse(&[0u8; 7]).map(|_| ()),
            Err(ExtendedCommunityError::MalformedLength(7))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_wire_order_is_preserved() {
        let store = ExtCommunityStore::new();
        let reversed = [RT_100_2, RT_100_1].concat();
        let sorted = [RT_100_1, RT_100_2].concat();
        let a = store.parse(&reversed).unwrap();
        let b = store.parse(&sorted).unwrap();
        assert!(!InternedExtCommunity::ptr_eq(&a, &b));
        assert_eq!(a.to_octets(), reversed);
        assert_eq!(b.to_octets(), sorted);
        assert_eq!(store.len(), 2);
        assert!(a.matches(&b) && b.matches(&a));

        let repeated = [RT_100_1, RT_100_1].concat();
        let c = store.parse(&repeated).unwrap();
        assert_eq!(c.size(), 2);
        assert_eq!(c.to_octets(), repeated);
        assert_eq!(store.refcount(&repeated), Some(1));
    }

    #[test]
    fn test_intern_existing_discards_new_value() {
        let store = ExtCommunityStore::new();
        let original = store.parse(&RT_100_1).unwrap();
        let mut edited = original.to_owned_value();
        edited
            .add_entry(ExtCommunityValue::two_octet_as(
                ExtendedCommunitySubType::RouteTarget,
                100,
                2,
            ))
            .unwrap();
        let edited = store.intern(edited);
        assert_eq!(store.len(), 2);
        let again = store.intern(ExtendedCommunity::from_octets(&[RT_100_1, RT_100_2].concat()).unwrap());
        assert_eq!(edited, again);
        assert_ne!(original, again);
        assert_eq!(again.refcount(), 2);
        let cloned = original.clone();
        assert_eq!(cloned.refcount(), 2);
        drop(original);
        drop(cloned);
        assert_eq!(store.len(), 1);
    }
}
