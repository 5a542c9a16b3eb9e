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


//! AS-path access lists.
//!
//! A list is an ordered sequence of `(action, regex)` filters evaluated
//! against the text form of an AS path, first match wins. Lists live in two
//! namespaces: names made only of digits sort by their numeric value, every
//! other name sorts lexicographically. A list exists as long as it holds at
//! least one filter.
//!
//! In the regex text `_` matches an AS path token boundary: the start or end
//! of the path, a space, a comma or one of `{}()`.

use bgpcore_bgp_pkt::AsPath;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Write;
use strum_macros::{Display, EnumString};

/// What `_` expands to before a regex is compiled
pub const AS_PATH_TOKEN_BOUNDARY: &str = "(^|[,{}() ]|$)";

#[derive(Display, EnumString, Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Permit,
    Deny,
}

/// Result of running an AS path through a list
#[derive(Display, Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Verdict {
    Permit,
    Deny,
    NoMatch,
}

impl From<FilterAction> for Verdict {
    fn from(value: FilterAction) -> Self {
        match value {
            FilterAction::Permit => Self::Permit,
            FilterAction::Deny => Self::Deny,
        }
    }
}

#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
pub enum AsPathFilterError {
    #[error("can't compile regexp `{regex}`: {reason}")]
    RegexCompile { regex: String, reason: String },

    #[error("as-path access-list `{list}` has no matching entry")]
    UnknownObject { list: String },
}

/// Compile AS path regex text, expanding `_` to [`AS_PATH_TOKEN_BOUNDARY`]
pub fn compile_as_path_regex(text: &str) -> Result<Regex, AsPathFilterError> {
    Regex::new(&text.replace('_', AS_PATH_TOKEN_BOUNDARY)).map_err(|err| {
        AsPathFilterError::RegexCompile {
            regex: text.to_string(),
            reason: err.to_string(),
        }
    })
}

/// One compiled filter of a list
#[derive(Debug, Clone)]
pub struct AsFilter {
    action: FilterAction,
    regex_text: String,
    regex: Regex,
}

impl AsFilter {
    pub fn new(action: FilterAction, regex_text: &str) -> Result<Self, AsPathFilterError> {
        Ok(Self {
            action,
            regex: compile_as_path_regex(regex_text)?,
            regex_text: regex_text.to_string(),
        })
    }

    pub const fn action(&self) -> FilterAction {
        self.action
    }

    /// The regex as configured, before `_` expansion
    pub fn regex_text(&self) -> &str {
        &self.regex_text
    }

    pub fn is_match(&self, as_path: &str) -> bool {
        self.regex.is_match(as_path)
    }

    fn same_as(&self, action: FilterAction, regex_text: &str) -> bool {
        self.action == action && self.regex_text == regex_text
    }
}

#[derive(Debug, Clone)]
pub struct AsPathAccessList {
    name: String,
    filters: Vec<AsFilter>,
}

impl AsPathAccessList {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> &[AsFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluate filters in insertion order, first match wins
    pub fn apply(&self, as_path: &str) -> Verdict {
        self.filters
            .iter()
            .find(|filter| filter.is_match(as_path))
            .map_or(Verdict::NoMatch, |filter| filter.action.into())
    }
}

/// True when `name` is a non-empty run of decimal digits. A name with only a
/// numeric prefix, such as `12x`, is a string name.
pub fn is_numeric_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Key of the numeric namespace. Orders by integer value without converting,
/// so names longer than any machine integer still sort correctly. Names with
/// the same value but different leading zeros order by their text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NumericName(String);

impl NumericName {
    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for NumericName {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NumericName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn get_or_insert<'m, K: Ord>(
    map: &'m mut BTreeMap<K, AsPathAccessList>,
    key: K,
    name: &str,
) -> (&'m mut AsPathAccessList, bool) {
    match map.entry(key) {
        Entry::Occupied(entry) => (entry.into_mut(), false),
        Entry::Vacant(entry) => (entry.insert(AsPathAccessList::new(name)), true),
    }
}

/// Called with the name of the list that changed
pub type ListHook = Box<dyn Fn(&str) + Send + Sync>;

/// Owner of all AS-path access lists
#[derive(Default)]
pub struct AsPathFilterEngine {
    numeric: BTreeMap<NumericName, AsPathAccessList>,
    named: BTreeMap<String, AsPathAccessList>,
    add_hook: Option<ListHook>,
    delete_hook: Option<ListHook>,
}

impl std::fmt::Debug for AsPathFilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsPathFilterEngine")
            .field("numeric", &self.numeric)
            .field("named", &self.named)
            .field("add_hook", &self.add_hook.is_some())
            .field("delete_hook", &self.delete_hook.is_some())
            .finish()
    }
}

impl AsPathFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook run after a list is created or gains a filter
    pub fn set_add_hook(&mut self, hook: ListHook) {
        self.add_hook = Some(hook);
    }

    /// Hook run after a list loses a filter or is deleted
    pub fn set_delete_hook(&mut self, hook: ListHook) {
        self.delete_hook = Some(hook);
    }

    fn run_add_hook(&self, name: &str) {
        if let Some(hook) = &self.add_hook {
            hook(name);
        }
    }

    fn run_delete_hook(&self, name: &str) {
        if let Some(hook) = &self.delete_hook {
            hook(name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&AsPathAccessList> {
        if is_numeric_name(name) {
            self.numeric.get(&NumericName(name.to_string()))
        } else {
            self.named.get(name)
        }
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut AsPathAccessList> {
        if is_numeric_name(name) {
            self.numeric.get_mut(&NumericName(name.to_string()))
        } else {
            self.named.get_mut(name)
        }
    }

    /// Returns the list and whether it was created by this call
    fn entry(&mut self, name: &str) -> (&mut AsPathAccessList, bool) {
        if is_numeric_name(name) {
            get_or_insert(&mut self.numeric, NumericName(name.to_string()), name)
        } else {
            get_or_insert(&mut self.named, name.to_string(), name)
        }
    }

    /// Find the list or create an empty one in the namespace the name
    /// belongs to. The add hook runs when the list is created.
    pub fn get_or_create(&mut self, name: &str) -> &AsPathAccessList {
        let (_, created) = self.entry(name);
        if created {
            tracing::debug!("created as-path access-list {name}");
            self.run_add_hook(name);
        }
        self.entry(name).0
    }

    /// Append a filter to the list, creating the list when needed.
    ///
    /// The regex is compiled first so a bad regex leaves no empty list
    /// behind. Adding a filter identical to one already present succeeds
    /// without changing the list.
    pub fn add_filter(
        &mut self,
        name: &str,
        regex_text: &str,
        action: FilterAction,
    ) -> Result<(), AsPathFilterError> {
        let filter = AsFilter::new(action, regex_text)?;
        let (list, _) = self.entry(name);
        if list.filters.iter().any(|f| f.same_as(action, regex_text)) {
            return Ok(());
        }
        list.filters.push(filter);
        tracing::debug!("as-path access-list {name}: added {action} {regex_text}");
        self.run_add_hook(name);
        Ok(())
    }

    /// Remove one filter. The list goes away with its last filter.
    pub fn delete_filter(
        &mut self,
        name: &str,
        regex_text: &str,
        action: FilterAction,
    ) -> Result<(), AsPathFilterError> {
        let unknown = || AsPathFilterError::UnknownObject {
            list: name.to_string(),
        };
        let list = self.lookup_mut(name).ok_or_else(unknown)?;
        let pos = list
            .filters
            .iter()
            .position(|f| f.same_as(action, regex_text))
            .ok_or_else(unknown)?;
        list.filters.remove(pos);
        let now_empty = list.is_empty();
        tracing::debug!("as-path access-list {name}: removed {action} {regex_text}");
        if now_empty {
            self.remove_list(name);
        }
        self.run_delete_hook(name);
        Ok(())
    }

    /// Remove a list with all of its filters
    pub fn delete_list(&mut self, name: &str) -> Result<(), AsPathFilterError> {
        if !self.remove_list(name) {
            return Err(AsPathFilterError::UnknownObject {
                list: name.to_string(),
            });
        }
        tracing::debug!("deleted as-path access-list {name}");
        self.run_delete_hook(name);
        Ok(())
    }

    fn remove_list(&mut self, name: &str) -> bool {
        if is_numeric_name(name) {
            self.numeric
                .remove(&NumericName(name.to_string()))
                .is_some()
        } else {
            self.named.remove(name).is_some()
        }
    }

    /// Evaluate the named list, [`Verdict::NoMatch`] when it does not exist
    pub fn apply(&self, name: &str, as_path: &str) -> Verdict {
        let verdict = self
            .lookup(name)
            .map_or(Verdict::NoMatch, |list| list.apply(as_path));
        tracing::trace!("as-path access-list {name} on [{as_path}]: {verdict}");
        verdict
    }

    /// [`Self::apply`] on the text form of an [`AsPath`]
    pub fn apply_path(&self, name: &str, as_path: &AsPath) -> Verdict {
        self.apply(name, &as_path.to_string())
    }

    /// All lists, the numeric namespace first
    pub fn lists(&self) -> impl Iterator<Item = &AsPathAccessList> {
        self.numeric.values().chain(self.named.values())
    }

    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.named.is_empty()
    }

    /// Operator listing of one list, or all of them when `name` is `None`.
    /// An unknown name prints nothing.
    pub fn show(&self, name: Option<&str>) -> String {
        let mut out = String::new();
        let lists: Vec<&AsPathAccessList> = match name {
            Some(name) => self.lookup(name).into_iter().collect(),
            None => self.lists().collect(),
        };
        for list in lists {
            let _ = writeln!(out, "AS path access list {}", list.name);
            for filter in &list.filters {
                let _ = writeln!(out, "    {} {}", filter.action, filter.regex_text);
            }
        }
        out
    }

    /// Configuration lines recreating every list, followed by `!` when any
    /// list exists
    pub fn config_write(&self) -> String {
        let mut out = String::new();
        for list in self.lists() {
            for filter in &list.filters {
                let _ = writeln!(
                    out,
                    "ip as-path access-list {} {} {}",
                    list.name, filter.action, filter.regex_text
                );
            }
        }
        if !out.is_empty() {
            out.push_str("!\n");
        }
        out
    }
}
