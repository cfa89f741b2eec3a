// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Storage and lookup index for translation rules

use crate::errors::XlateError;
use crate::rule::{RuleId, RulePair, RulesetKind};
use ahash::RandomState;
use lpm::prefix::{IpPrefix, Ipv4Prefix, Ipv6Prefix};
use lpm::trie::Tree46;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

#[allow(unused)]
use tracing::{debug, error, warn};

/// A set of translation rules. The ruleset owns the rules, and indexes them by one of their
/// associations (depending on its kind) in a [`Tree46`] of [`RuleId`]s.
///
/// A rule is freed only once it is no longer referenced from either family of the index.
#[derive(Debug, Clone)]
pub struct Ruleset {
    kind: RulesetKind,
    next_id: u64,
    rules: HashMap<RuleId, RulePair, RandomState>,
    index: Tree46<RuleId>,
}

impl Ruleset {
    /// Creates a new, empty [`Ruleset`]
    #[must_use]
    pub fn new(kind: RulesetKind) -> Self {
        Self {
            kind,
            next_id: 0,
            rules: HashMap::with_hasher(RandomState::with_seed(0)),
            index: Tree46::new(),
        }
    }

    /// Creates a new, empty [`Ruleset`] with room for `capacity` rules
    ///
    /// # Errors
    ///
    /// Returns [`XlateError::AllocationFailure`] if the storage can't be allocated.
    pub fn with_capacity(kind: RulesetKind, capacity: usize) -> Result<Self, XlateError> {
        let mut ruleset = Self::new(kind);
        ruleset
            .rules
            .try_reserve(capacity)
            .map_err(|_| XlateError::AllocationFailure)?;
        Ok(ruleset)
    }

    #[must_use]
    pub fn kind(&self) -> RulesetKind {
        self.kind
    }

    /// Adds a rule, indexed by its association for this ruleset's kind.
    ///
    /// # Errors
    ///
    /// Returns [`XlateError::Conflict`] if the IPv4 or IPv6 prefix of the association is already
    /// used by another rule, in which case the ruleset is left unchanged, or
    /// [`XlateError::AllocationFailure`] if the rule can't be stored.
    pub fn insert(&mut self, rule: RulePair) -> Result<RuleId, XlateError> {
        self.rules
            .try_reserve(1)
            .map_err(|_| XlateError::AllocationFailure)?;
        let id = RuleId::new(self.next_id);
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or(XlateError::AllocationFailure)?;

        let key = rule.association(self.kind);
        self.index
            .insert(
                key.v4.network(),
                key.v4.len(),
                key.v6.network(),
                key.v6.len(),
                id,
            )
            .map_err(|e| XlateError::Conflict(rule, e))?;

        self.next_id = next_id;
        self.rules.insert(id, rule);
        debug!("Added {} rule {}: {rule}", self.kind, id.as_u64());
        Ok(id)
    }

    fn is_indexed(&self, id: RuleId) -> bool {
        let Some(rule) = self.rules.get(&id) else {
            return false;
        };
        let key = rule.association(self.kind);
        self.index.v4().get(&key.v4.network(), key.v4.len()) == Some(&id)
            || self.index.v6().get(&key.v6.network(), key.v6.len()) == Some(&id)
    }

    /// Removes the entries for prefix `addr4/len4` and for prefix `addr6/len6` from the index, with
    /// exact match. Rules that are no longer indexed are freed.
    ///
    /// Returns `true` if at least one of the entries was removed.
    pub fn remove(&mut self, addr4: Ipv4Addr, len4: u8, addr6: Ipv6Addr, len6: u8) -> bool {
        let candidates = [
            self.index.v4().get(&addr4, len4).copied(),
            self.index.v6().get(&addr6, len6).copied(),
        ];
        if !self.index.remove(addr4, len4, addr6, len6) {
            return false;
        }
        for id in candidates.into_iter().flatten() {
            if self.is_indexed(id) {
                warn!(
                    "{} rule {} is still partially indexed after removal",
                    self.kind,
                    id.as_u64()
                );
                continue;
            }
            if let Some(rule) = self.rules.remove(&id) {
                debug!("Removed {} rule {}: {rule}", self.kind, id.as_u64());
            }
        }
        true
    }

    /// Gets a rule from its handle
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&RulePair> {
        self.rules.get(&id)
    }

    /// Looks up the rule of the longest IPv4 prefix covering `addr`.
    #[must_use]
    pub fn lookup_v4(&self, addr: &Ipv4Addr) -> Option<(&Ipv4Prefix, &RulePair)> {
        let (prefix, id) = self.index.lookup_v4(addr)?;
        self.rules.get(id).map(|rule| (prefix, rule))
    }

    /// Looks up the rule of the longest IPv6 prefix covering `addr`.
    #[must_use]
    pub fn lookup_v6(&self, addr: &Ipv6Addr) -> Option<(&Ipv6Prefix, &RulePair)> {
        let (prefix, id) = self.index.lookup_v6(addr)?;
        self.rules.get(id).map(|rule| (prefix, rule))
    }

    /// Iterates over the rules of the ruleset, ordered by the prefixes they are indexed by. Rules
    /// left indexed in a single family by a partial removal are included.
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &RulePair)> {
        let mut rules: Vec<_> = self.rules.iter().map(|(id, rule)| (*id, rule)).collect();
        rules.sort_by_key(|(id, rule)| {
            let key = rule.association(self.kind);
            (key.v4, key.v6, *id)
        });
        rules.into_iter()
    }

    /// Number of rules in the ruleset
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Unregisters and frees every rule of the ruleset.
    ///
    /// Returns the number of rules freed.
    pub fn drain(&mut self) -> usize {
        let ids: Vec<RuleId> = self.index.iter().map(|(_, id)| *id).collect();
        let mut freed = 0;
        for id in ids {
            let Some(rule) = self.rules.get(&id).copied() else {
                error!("{} rule {} is indexed but not stored", self.kind, id.as_u64());
                continue;
            };
            let key = rule.association(self.kind);
            self.index.remove(
                key.v4.network(),
                key.v4.len(),
                key.v6.network(),
                key.v6.len(),
            );
            self.rules.remove(&id);
            freed += 1;
        }
        if !self.rules.is_empty() || !self.index.is_empty() {
            warn!(
                "{} ruleset still holds {} partially indexed rules, dropping them",
                self.kind,
                self.rules.len()
            );
            freed += self.rules.len();
            self.rules.clear();
            self.index.clear();
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Association;
    use lpm::trie::TrieError;
    use std::str::FromStr;

    fn assoc(v4: &str, v6: &str) -> Association {
        Association::new(
            Ipv4Prefix::from_str(v4).expect("Invalid IPv4 prefix"),
            Ipv6Prefix::from_str(v6).expect("Invalid IPv6 prefix"),
        )
    }

    fn rule(local: (&str, &str), remote: (&str, &str)) -> RulePair {
        RulePair::new(assoc(local.0, local.1), assoc(remote.0, remote.1))
    }

    fn remove(ruleset: &mut Ruleset, key: &Association) -> bool {
        ruleset.remove(key.v4.network(), key.v4.len(), key.v6.network(), key.v6.len())
    }

    #[test]
    fn test_ruleset_kind_selects_key() {
        let r = rule(
            ("10.0.0.0/8", "2001:db8::/32"),
            ("0.0.0.0/0", "64:ff9b::/96"),
        );
        let mut local = Ruleset::new(RulesetKind::Local);
        let mut remote = Ruleset::new(RulesetKind::Remote);
        local.insert(r).unwrap();
        remote.insert(r).unwrap();

        let addr = Ipv4Addr::new(10, 1, 1, 1);
        assert_eq!(local.lookup_v4(&addr).map(|(_, r)| r), Some(&r));
        assert_eq!(
            local.lookup_v4(&Ipv4Addr::new(8, 8, 8, 8)).map(|(_, r)| r),
            None
        );
        // remote ruleset is indexed by 0.0.0.0/0 and catches everything
        assert_eq!(
            remote
                .lookup_v4(&Ipv4Addr::new(8, 8, 8, 8))
                .map(|(p, r)| (p.len(), r)),
            Some((0, &r))
        );
        assert_eq!(
            remote
                .lookup_v6(&"64:ff9b::808:808".parse().unwrap())
                .map(|(_, r)| r),
            Some(&r)
        );
    }

    #[test]
    fn test_insert_conflict() {
        let mut ruleset = Ruleset::new(RulesetKind::Local);
        let r1 = rule(("10.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let r2 = rule(("10.0.0.0/8", "2001:db9::/32"), ("0.0.0.0/0", "::/0"));
        let r3 = rule(("11.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let id = ruleset.insert(r1).unwrap();

        assert_eq!(
            ruleset.insert(r2),
            Err(XlateError::Conflict(r2, TrieError::EntryExists))
        );
        assert_eq!(
            ruleset.insert(r3),
            Err(XlateError::Conflict(r3, TrieError::EntryExists))
        );
        assert_eq!(ruleset.len(), 1);
        assert_eq!(ruleset.get(id), Some(&r1));
        assert_eq!(
            ruleset.lookup_v4(&Ipv4Addr::new(11, 0, 0, 1)).map(|(_, r)| r),
            None
        );
    }

    #[test]
    fn test_remove_frees_rule() {
        let mut ruleset = Ruleset::new(RulesetKind::Local);
        let r = rule(("10.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let id = ruleset.insert(r).unwrap();

        assert!(remove(&mut ruleset, &r.local));
        assert_eq!(ruleset.get(id), None);
        assert!(ruleset.is_empty());
        assert!(!remove(&mut ruleset, &r.local));
    }

    #[test]
    fn test_remove_mismatched_keys() {
        let mut ruleset = Ruleset::new(RulesetKind::Local);
        let r1 = rule(("10.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let r2 = rule(("11.0.0.0/8", "2001:db9::/32"), ("0.0.0.0/0", "::/0"));
        let id1 = ruleset.insert(r1).unwrap();
        let id2 = ruleset.insert(r2).unwrap();

        // IPv4 key of r1, IPv6 key of r2: both rules remain half-indexed, none is freed
        let key = assoc("10.0.0.0/8", "2001:db9::/32");
        assert!(remove(&mut ruleset, &key));
        assert_eq!(ruleset.get(id1), Some(&r1));
        assert_eq!(ruleset.get(id2), Some(&r2));
        assert_eq!(
            ruleset.lookup_v4(&Ipv4Addr::new(10, 0, 0, 1)).map(|(_, r)| r),
            None
        );

        // completing the removal of r1 frees it
        let key = assoc("11.0.0.0/8", "2001:db8::/32");
        assert!(remove(&mut ruleset, &key));
        assert_eq!(ruleset.get(id1), None);
        assert_eq!(ruleset.get(id2), None);
        assert!(ruleset.is_empty());
    }

    #[test]
    fn test_iter_after_partial_removal() {
        let mut ruleset = Ruleset::new(RulesetKind::Local);
        let r1 = rule(("10.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let r2 = rule(("11.0.0.0/8", "2001:db9::/32"), ("0.0.0.0/0", "::/0"));
        let id1 = ruleset.insert(r1).unwrap();
        let id2 = ruleset.insert(r2).unwrap();

        // r1 is left indexed in IPv6 only, r2 in IPv4 only
        let key = assoc("10.0.0.0/8", "2001:db9::/32");
        assert!(remove(&mut ruleset, &key));
        assert_eq!(ruleset.len(), 2);
        let listed: Vec<_> = ruleset.iter().map(|(id, _)| id).collect();
        assert_eq!(listed, vec![id1, id2]);

        let shown = ruleset.to_string();
        assert!(shown.contains("local rules (2)"));
        assert!(shown.contains("#0 local 10.0.0.0/8"));
        assert!(shown.contains("#1 local 11.0.0.0/8"));
    }

    #[test]
    fn test_iter_and_drain() {
        let mut ruleset = Ruleset::with_capacity(RulesetKind::Remote, 4).unwrap();
        let rules = [
            rule(("10.0.0.0/8", "::/0"), ("192.168.0.0/16", "2001:db8::/32")),
            rule(("10.0.0.0/8", "::/0"), ("192.168.1.0/24", "2001:db8:1::/48")),
            rule(("10.0.0.0/8", "::/0"), ("172.16.0.0/12", "64:ff9b::/96")),
        ];
        let ids: Vec<_> = rules.iter().map(|r| ruleset.insert(*r).unwrap()).collect();
        assert_eq!(ruleset.iter().count(), rules.len());
        for (id, r) in ids.iter().zip(&rules) {
            assert_eq!(ruleset.get(*id), Some(r));
            assert!(ruleset.iter().any(|(i, rule)| i == *id && rule == r));
        }

        assert_eq!(ruleset.drain(), rules.len());
        assert!(ruleset.is_empty());
        assert_eq!(ruleset.iter().count(), 0);
        assert_eq!(
            ruleset.lookup_v4(&Ipv4Addr::new(192, 168, 1, 1)).map(|(_, r)| r),
            None
        );
        assert_eq!(ruleset.drain(), 0);
    }

    #[test]
    fn test_drain_partially_indexed() {
        let mut ruleset = Ruleset::new(RulesetKind::Local);
        let r1 = rule(("10.0.0.0/8", "2001:db8::/32"), ("0.0.0.0/0", "::/0"));
        let r2 = rule(("11.0.0.0/8", "2001:db9::/32"), ("0.0.0.0/0", "::/0"));
        ruleset.insert(r1).unwrap();
        ruleset.insert(r2).unwrap();
        let key = assoc("10.0.0.0/8", "2001:db9::/32");
        assert!(remove(&mut ruleset, &key));

        assert_eq!(ruleset.drain(), 2);
        assert!(ruleset.is_empty());
    }

    #[test]
    fn test_storage_follows_index_contract() {
        bolero::check!()
            .with_type::<Vec<(Ipv4Prefix, Ipv6Prefix, bool)>>()
            .for_each(|keys| {
                let mut ruleset = Ruleset::new(RulesetKind::Local);
                let mut kept = Vec::new();
                for (p4, p6, keep) in keys {
                    let rule = RulePair::new(Association::new(*p4, *p6), Association::default());
                    if let Ok(id) = ruleset.insert(rule) {
                        if *keep {
                            kept.push(id);
                        } else {
                            assert!(remove(&mut ruleset, &rule.local));
                            assert_eq!(ruleset.get(id), None);
                        }
                    }
                    assert_eq!(ruleset.len(), ruleset.index.v4().len());
                    assert_eq!(ruleset.len(), ruleset.index.v6().len());
                }
                for id in &kept {
                    let key = ruleset.get(*id).expect("Rule should be stored").local;
                    assert!(ruleset.is_indexed(*id));
                    assert!(
                        ruleset
                            .lookup_v6(&key.v6.last_address())
                            .is_some_and(|(p, _)| p.len() >= key.v6.len())
                    );
                }
                assert_eq!(ruleset.drain(), kept.len());
                assert!(ruleset.index.is_empty());
            });
    }
}
