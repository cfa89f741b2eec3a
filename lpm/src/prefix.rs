// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per address-family network prefixes.
//!
//! Every prefix held by this module is canonical: the bits of the network address past the prefix
//! length are zero, so that two representations of the same prefix always compare equal.

use thiserror::Error;

mod ip;
pub use ip::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("Invalid Prefix: {0}")]
    Invalid(String),
    #[error("Mask length {0} is invalid")]
    InvalidLength(u8),
}
