// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use crate::rule::RulePair;
use lpm::trie::TrieError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XlateError {
    #[error("Memory allocation failure")]
    AllocationFailure,

    #[error("Rule {0} conflicts with an existing rule: {1}")]
    Conflict(RulePair, TrieError),

    #[error("Translation context is not valid")]
    InvalidContext,

    #[error("Device {0} is already associated to a translation context")]
    DeviceExists(String),
}
