// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A pair of tries indexing the same values by an IPv4 and an IPv6 prefix.

use crate::prefix::{Ipv4Prefix, Ipv6Prefix};
use crate::trie::{BitTrie, TrieError};
use std::fmt::Debug;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// A [`Tree46`] associates each of its values to one IPv4 prefix and one IPv6 prefix, and allows
/// looking values up from an address of either family, with longest prefix match.
///
/// Values are meant to be handles to some storage owned elsewhere: the tree holds two copies of
/// each of them, one per family. A value is always present in both families or in none.
///
/// Note: This structure has no internal locking.
#[derive(Clone)]
pub struct Tree46<V> {
    v4: BitTrie<Ipv4Prefix, V>,
    v6: BitTrie<Ipv6Prefix, V>,
}

impl<V> Default for Tree46<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Tree46<V> {
    /// Creates a new, empty [`Tree46`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            v4: BitTrie::new(),
            v6: BitTrie::new(),
        }
    }

    /// The IPv4 index
    #[must_use]
    pub fn v4(&self) -> &BitTrie<Ipv4Prefix, V> {
        &self.v4
    }

    /// The IPv6 index
    #[must_use]
    pub fn v6(&self) -> &BitTrie<Ipv6Prefix, V> {
        &self.v6
    }

    /// Looks up the value of the longest IPv4 prefix covering `addr`.
    #[must_use]
    pub fn lookup_v4(&self, addr: &Ipv4Addr) -> Option<(&Ipv4Prefix, &V)> {
        self.v4.lookup(addr)
    }

    /// Looks up the value of the longest IPv6 prefix covering `addr`.
    #[must_use]
    pub fn lookup_v6(&self, addr: &Ipv6Addr) -> Option<(&Ipv6Prefix, &V)> {
        self.v6.lookup(addr)
    }

    /// Iterates over the values in the tree, each of them exactly once, along with their IPv4
    /// prefix.
    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Prefix, &V)> {
        // every value is in both tries, walking one is enough
        self.v4.iter()
    }

    /// Number of values in the tree
    #[must_use]
    pub fn len(&self) -> usize {
        self.v4.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    pub fn clear(&mut self) {
        self.v4.clear();
        self.v6.clear();
    }
}

impl<V: Copy + Eq + Debug> Tree46<V> {
    /// Inserts `value` for prefix `addr4/len4` in the IPv4 trie and for prefix `addr6/len6` in the
    /// IPv6 trie. Both insertions succeed, or none is kept.
    ///
    /// # Errors
    ///
    /// Returns the error of the first insertion that failed. If the IPv6 side fails, the IPv4
    /// insertion is rolled back before returning.
    pub fn insert(
        &mut self,
        addr4: Ipv4Addr,
        len4: u8,
        addr6: Ipv6Addr,
        len6: u8,
        value: V,
    ) -> Result<(), TrieError> {
        self.v4.insert(addr4, len4, value)?;
        if let Err(e) = self.v6.insert(addr6, len6, value) {
            debug!("Can't insert {addr6}/{len6} for {value:?} ({e}): rolling back {addr4}/{len4}");
            let rolled_back = self.v4.remove(addr4, len4);
            debug_assert_eq!(rolled_back, Some(value));
            return Err(e);
        }
        Ok(())
    }

    /// Removes the entries of prefix `addr4/len4` from the IPv4 trie and of prefix `addr6/len6`
    /// from the IPv6 trie, with exact match.
    ///
    /// Returns `true` if an entry was removed from at least one of the tries.
    pub fn remove(&mut self, addr4: Ipv4Addr, len4: u8, addr6: Ipv6Addr, len6: u8) -> bool {
        let removed4 = self.v4.remove(addr4, len4);
        let removed6 = self.v6.remove(addr6, len6);
        if removed4 != removed6 {
            debug!(
                "Partial removal: {addr4}/{len4} -> {removed4:?}, {addr6}/{len6} -> {removed6:?}"
            );
        }
        removed4.is_some() || removed6.is_some()
    }
}

impl<V: Debug> Debug for Tree46<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tree46")
            .field("v4", &self.v4)
            .field("v6", &self.v6)
            .finish()
    }
}
