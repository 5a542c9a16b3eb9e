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


use bgpcore_aspath_filter::{AsPathFilterEngine, Verdict};
use bgpcore_mrt::{DumpRoute, RouteSource};
use ipnet::IpNet;
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Best route per prefix, the table `dump bgp routes-mrt` writes out
#[derive(Debug, Clone, Default)]
pub struct LocalRib {
    routes: Arc<RwLock<BTreeMap<IpNet, DumpRoute>>>,
}

impl LocalRib {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<IpNet, DumpRoute>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<IpNet, DumpRoute>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install or replace the route of its prefix
    pub fn insert(&self, route: DumpRoute) -> Option<DumpRoute> {
        self.write().insert(route.prefix, route)
    }

    /// Install the route unless the AS-path access list denies it. A missing
    /// list denies nothing.
    pub fn insert_filtered(
        &self,
        route: DumpRoute,
        filters: &AsPathFilterEngine,
        list: &str,
    ) -> Verdict {
        let verdict = filters.apply_path(list, &route.attributes.as_path);
        if verdict != Verdict::Deny {
            self.insert(route);
        }
        verdict
    }

    pub fn withdraw(&self, prefix: &IpNet) -> Option<DumpRoute> {
        self.write().remove(prefix)
    }

    pub fn get(&self, prefix: &IpNet) -> Option<DumpRoute> {
        self.read().get(prefix).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl RouteSource for LocalRib {
    fn table_routes(&self) -> Vec<DumpRoute> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgpcore_aspath_filter::FilterAction;
    use bgpcore_bgp_pkt::{path_attribute::Origin, AsPath, PathAttributes};
    use std::net::Ipv4Addr;

    fn route(prefix: &str, as_path: Vec<u32>) -> DumpRoute {
        DumpRoute {
            prefix: prefix.parse().unwrap(),
            originated: 1_700_000_000,
            peer_address: "192.0.2.1".parse().unwrap(),
            peer_as: 65001,
            attributes: PathAttributes::new(
                Origin::Igp,
                AsPath::from_sequence(as_path),
                Ipv4Addr::new(192, 0, 2, 1),
            ),
        }
    }

    #[test]
    fn test_insert_withdraw() {
        let rib = LocalRib::new();
        assert!(rib.insert(route("10.0.0.0/8", vec![65001])).is_none());
        assert!(rib.insert(route("10.0.0.0/8", vec![65001, 65002])).is_some());
        rib.insert(route("2001:db8::/32", vec![65001]));
        rib.insert(route("192.0.2.0/24", vec![65001]));
        assert_eq!(rib.len(), 3);

        let prefixes: Vec<IpNet> = rib.table_routes().iter().map(|r| r.prefix).collect();
        assert_eq!(
            prefixes,
            vec![
                "10.0.0.0/8".parse::<IpNet>().unwrap(),
                "192.0.2.0/24".parse().unwrap(),
                "2001:db8::/32".parse().unwrap(),
            ]
        );

        let prefix: IpNet = "10.0.0.0/8".parse().unwrap();
        assert_eq!(
            rib.get(&prefix).map(|r| r.attributes.as_path),
            Some(AsPath::from_sequence(vec![65001, 65002]))
        );
        assert!(rib.withdraw(&prefix).is_some());
        assert!(rib.withdraw(&prefix).is_none());
        assert_eq!(rib.len(), 2);
    }

    #[test]
    fn test_insert_filtered() {
        let mut filters = AsPathFilterEngine::new();
        filters
            .add_filter("transit", "_65002_", FilterAction::Deny)
            .unwrap();
        filters
            .add_filter("transit", ".*", FilterAction::Permit)
            .unwrap();
        let rib = LocalRib::new();
        assert_eq!(
            rib.insert_filtered(route("10.0.0.0/8", vec![65001, 65002]), &filters, "transit"),
            Verdict::Deny
        );
        assert_eq!(
            rib.insert_filtered(route("10.1.0.0/16", vec![65001]), &filters, "transit"),
            Verdict::Permit
        );
        assert_eq!(
            rib.insert_filtered(route("10.2.0.0/16", vec![65002]), &filters, "missing"),
            Verdict::NoMatch
        );
        assert_eq!(rib.len(), 2);
    }
}
