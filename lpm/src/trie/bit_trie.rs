// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A binary trie over the bits of an address, one bit per level.
//!
//! A node at depth `n` holds the canonical prefix of length `n` of the addresses below it. Nodes
//! are only created along the path of an insertion, and are pruned as soon as they hold no value
//! and have no children.

use crate::prefix::IpPrefix;
use crate::trie::TrieError;
use std::fmt::Debug;

#[derive(Clone)]
struct Node<P: IpPrefix, V> {
    prefix: P,
    left: Option<Box<Node<P, V>>>,
    right: Option<Box<Node<P, V>>>,
    value: Option<V>,
}

impl<P: IpPrefix, V> Node<P, V> {
    fn new(prefix: P) -> Box<Self> {
        Box::new(Self {
            prefix,
            left: None,
            right: None,
            value: None,
        })
    }

    fn is_vacant(&self) -> bool {
        self.value.is_none() && self.left.is_none() && self.right.is_none()
    }

    /// The child slot that `addr` descends into from this node
    fn slot_mut(&mut self, addr: &P::Addr) -> &mut Option<Box<Self>> {
        if P::addr_bit(addr, self.prefix.len()) {
            &mut self.right
        } else {
            &mut self.left
        }
    }

    fn child(&self, addr: &P::Addr) -> Option<&Self> {
        if P::addr_bit(addr, self.prefix.len()) {
            self.right.as_deref()
        } else {
            self.left.as_deref()
        }
    }
}

/// Depth-first, pre-order traversal of all the nodes of a trie.
struct Nodes<'a, P: IpPrefix, V> {
    stack: Vec<&'a Node<P, V>>,
}

impl<'a, P: IpPrefix, V> Iterator for Nodes<'a, P, V> {
    type Item = &'a Node<P, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(right) = node.right.as_deref() {
            self.stack.push(right);
        }
        if let Some(left) = node.left.as_deref() {
            self.stack.push(left);
        }
        Some(node)
    }
}

/// A [`BitTrie`] maps prefixes of a single address family to values, and finds the value of the
/// longest prefix covering a given address.
///
/// At most one value is stored per prefix: inserting at an occupied prefix is a conflict and leaves
/// the trie untouched.
///
/// Note: This structure has no internal locking.
#[derive(Clone)]
pub struct BitTrie<P: IpPrefix, V> {
    root: Option<Box<Node<P, V>>>,
}

impl<P: IpPrefix, V> Default for BitTrie<P, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: IpPrefix, V> BitTrie<P, V> {
    /// Creates a new, empty [`BitTrie`].
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Associates `value` to the prefix of length `len` covering `addr`. Bits of `addr` past `len`
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TrieError::EntryExists`] if a value is already associated to that prefix, and
    /// [`TrieError::InvalidLength`] if `len` exceeds the width of the family. The trie is not
    /// modified in either case.
    pub fn insert(&mut self, addr: P::Addr, len: u8, value: V) -> Result<(), TrieError> {
        if len > P::MAX_LEN {
            return Err(TrieError::InvalidLength(len));
        }
        let mut node = self.root.get_or_insert_with(|| Node::new(P::ROOT));
        while node.prefix.len() < len {
            let depth = node.prefix.len();
            node = node
                .slot_mut(&addr)
                .get_or_insert_with(|| Node::new(P::truncate(addr, depth + 1)));
        }
        if node.value.is_some() {
            return Err(TrieError::EntryExists);
        }
        node.value = Some(value);
        Ok(())
    }

    /// Removes the value associated to the prefix of length `len` covering `addr`. This is an
    /// exact match, no LPM is done. Nodes left without value nor children are freed.
    ///
    /// Returns the removed value, if any.
    pub fn remove(&mut self, addr: P::Addr, len: u8) -> Option<V> {
        if len > P::MAX_LEN {
            return None;
        }
        Self::remove_from(&mut self.root, &addr, len)
    }

    fn remove_from(slot: &mut Option<Box<Node<P, V>>>, addr: &P::Addr, len: u8) -> Option<V> {
        let node = slot.as_mut()?;
        let removed = if node.prefix.len() == len {
            node.value.take()
        } else {
            Self::remove_from(node.slot_mut(addr), addr, len)
        };
        if removed.is_some() && node.is_vacant() {
            *slot = None;
        }
        removed
    }

    /// Gets the value of the prefix of length `len` covering `addr`, with exact match. It does not
    /// do LPM.
    #[must_use]
    pub fn get(&self, addr: &P::Addr, len: u8) -> Option<&V> {
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            if node.prefix.len() == len {
                return node.value.as_ref();
            }
            cursor = node.child(addr);
        }
        None
    }

    /// Looks up the value of the longest prefix covering `addr`.
    ///
    /// Returns the matching prefix and its value, or `None` if no prefix covers `addr`.
    #[must_use]
    pub fn lookup(&self, addr: &P::Addr) -> Option<(&P, &V)> {
        let mut best = None;
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            if let Some(value) = node.value.as_ref() {
                best = Some((&node.prefix, value));
            }
            if node.prefix.len() >= P::MAX_LEN {
                break;
            }
            cursor = node.child(addr);
        }
        best
    }

    fn nodes(&self) -> Nodes<'_, P, V> {
        Nodes {
            stack: self.root.as_deref().into_iter().collect(),
        }
    }

    /// Iterates, depth-first, over the prefixes that hold a value. Parents come before their
    /// children, and the left (bit unset) branch before the right one.
    pub fn iter(&self) -> impl Iterator<Item = (&P, &V)> {
        self.nodes()
            .filter_map(|node| node.value.as_ref().map(|value| (&node.prefix, value)))
    }

    /// Number of values in the trie
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of nodes in the trie, including the intermediate ones that hold no value
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn clear(&mut self) {
        self.root = None;
    }
}

impl<P: IpPrefix, V: Debug> Debug for BitTrie<P, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
