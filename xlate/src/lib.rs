// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Stateless IPv4/IPv6 (NAT46) translation rules and contexts.
//!
//! A translation context owns two rulesets, `local` and `remote`. Each ruleset stores rule pairs
//! and indexes them by one of their two associations, so that a rule can be looked up from an
//! IPv4 or an IPv6 address with longest prefix match. Contexts are reference-counted, and can be
//! associated to network devices through a [`DeviceTable`].

#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod config;
mod context;
mod device;
mod display;
mod errors;
mod rule;
mod ruleset;

pub use config::{ConfigError, RuleEntry, XlateConfig};
pub use context::{ContextRef, FREED_SIGNATURE, Rulesets, VALID_SIGNATURE, XlateContext};
pub use device::DeviceTable;
pub use errors::XlateError;
pub use rule::{Association, RuleId, RulePair, RulesetKind};
pub use ruleset::Ruleset;
