// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Longest Prefix Match (LPM) structures for stateless IPv4/IPv6 translation.
//!
//! This crate provides per-family prefix types, a binary trie over address bits ([`BitTrie`]) and
//! a pair of such tries indexing the same values from both address families ([`Tree46`]).
//!
//! [`BitTrie`]: trie::BitTrie
//! [`Tree46`]: trie::Tree46

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::similar_names)]

pub mod prefix;
pub mod trie;
