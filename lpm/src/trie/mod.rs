// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

mod bit_trie;
pub use bit_trie::BitTrie;

mod tree46;
pub use tree46::Tree46;

/// Error type for [`BitTrie`] and [`Tree46`] insertions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrieError {
    #[error("entry already exists")]
    EntryExists,
    #[error("prefix length {0} exceeds the address width")]
    InvalidLength(u8),
}
