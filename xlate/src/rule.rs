// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Translation rules

use lpm::prefix::{IpPrefix, Ipv4Prefix, Ipv6Prefix};
use serde::{Deserialize, Serialize};

/// One side of a translation rule: an IPv4 prefix and the IPv6 prefix it translates to.
///
/// An IPv6 prefix of length zero means that the side has no IPv6 association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Association {
    pub v4: Ipv4Prefix,
    #[serde(default)]
    pub v6: Ipv6Prefix,
}

impl Association {
    #[must_use]
    pub fn new(v4: Ipv4Prefix, v6: Ipv6Prefix) -> Self {
        Self { v4, v6 }
    }

    /// Tell if this side associates its IPv4 prefix to some IPv6 prefix
    #[must_use]
    pub fn has_v6(&self) -> bool {
        self.v6.len() != 0
    }
}

/// The unit of translation configuration: the associations used for the local and the remote
/// ends of a translated flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RulePair {
    pub local: Association,
    pub remote: Association,
}

impl RulePair {
    #[must_use]
    pub fn new(local: Association, remote: Association) -> Self {
        Self { local, remote }
    }

    /// The association that a ruleset of the given kind indexes this rule by
    #[must_use]
    pub fn association(&self, kind: RulesetKind) -> &Association {
        match kind {
            RulesetKind::Local => &self.local,
            RulesetKind::Remote => &self.remote,
        }
    }
}

/// Selects one of the two rulesets of a translation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesetKind {
    /// Rules indexed by their local association
    Local,
    /// Rules indexed by their remote association
    Remote,
}

/// Handle to a rule stored in a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u64);

impl RuleId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
