use crate::link::DropReason;
use std::collections::HashMap;
use std::net::IpAddr;

/// The authoritative mapping of service names to the IPs claimed under them,
/// with a per-IP reference count across all names. This is the decision
/// oracle responders consult before answering for an address.
#[derive(Default)]
pub(crate) struct Registry {
    names: HashMap<String, Vec<IpAddr>>,
    refcnt: HashMap<IpAddr, usize>,
}

impl Registry {
    /// Appends `ip` under `name`. The control plane may claim the same
    /// (name, ip) pair more than once; multiplicity is kept, and every claim
    /// must be paired with a `remove_all` on the same name. Returns true when
    /// this is the first reference to `ip` anywhere in the registry.
    pub fn add(&mut self, name: &str, ip: IpAddr) -> bool {
        self.names.entry(name.to_string()).or_default().push(ip);
        let refs = self.refcnt.entry(ip).or_insert(0);
        *refs += 1;
        *refs == 1
    }

    /// Detaches `name` and decrements its IPs' reference counts in stored
    /// order, returning the IPs that became unreferenced. The walk stops at
    /// the first IP that still has references: later IPs under the same name
    /// keep their counts untouched. Callers therefore group only
    /// uniformly-shared IPs under one name.
    pub fn remove_all(&mut self, name: &str) -> Vec<IpAddr> {
        let ips = match self.names.remove(name) {
            Some(ips) => ips,
            None => return Vec::new(),
        };

        let mut freed = Vec::new();
        for ip in ips {
            let remaining = match self.refcnt.get_mut(&ip) {
                Some(refs) => {
                    *refs = refs.saturating_sub(1);
                    *refs
                }
                None => 0,
            };
            if remaining > 0 {
                return freed;
            }
            self.refcnt.remove(&ip);
            freed.push(ip);
        }
        freed
    }

    /// Whether a responder should answer for `ip`: [`DropReason::None`] when
    /// some name currently lists it, [`DropReason::AnnounceIp`] otherwise.
    pub fn announceable(&self, ip: IpAddr) -> DropReason {
        for ips in self.names.values() {
            if ips.contains(&ip) {
                return DropReason::None;
            }
        }
        DropReason::AnnounceIp
    }

    pub fn refs(&self, ip: IpAddr) -> usize {
        self.refcnt.get(&ip).copied().unwrap_or(0)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Every IP currently referenced by at least one name. The tracker uses
    /// this to re-join multicast groups on a freshly created responder.
    pub fn ips_with_refs(&self) -> Vec<IpAddr> {
        self.refcnt
            .iter()
            .filter(|(_, refs)| **refs > 0)
            .map(|(ip, _)| *ip)
            .collect()
    }
}
