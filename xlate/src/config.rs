// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Declarative translation rule tables

use crate::context::XlateContext;
use crate::errors::XlateError;
use crate::rule::{Association, RulePair, RulesetKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[allow(unused)]
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid translation configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("Failed to apply rule entry {index}: {source}")]
    Apply {
        index: usize,
        #[source]
        source: XlateError,
    },
}

/// A rule, along with the ruleset it goes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub ruleset: RulesetKind,
    pub local: Association,
    pub remote: Association,
}

impl RuleEntry {
    #[must_use]
    pub fn rule(&self) -> RulePair {
        RulePair::new(self.local, self.remote)
    }
}

/// A table of translation rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XlateConfig {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl XlateConfig {
    /// Parses a rule table from YAML. Prefixes with host bits set are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not a valid rule table.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Serializes the rule table to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Inserts the rules of the table into the rulesets of `ctx`, in order. Stops at the first
    /// rule that can't be inserted; the rules inserted before it are kept.
    ///
    /// Returns the number of rules inserted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Apply`], with the index of the failing entry.
    pub fn apply(&self, ctx: &XlateContext) -> Result<usize, ConfigError> {
        for (index, entry) in self.rules.iter().enumerate() {
            if let Err(source) = ctx.insert_rule(entry.ruleset, entry.rule()) {
                warn!("Failed to apply rule entry {index}: {source}");
                return Err(ConfigError::Apply { index, source });
            }
        }
        debug!("Applied {} translation rules", self.rules.len());
        Ok(self.rules.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpm::prefix::{IpPrefix, Ipv6Prefix};
    use lpm::trie::TrieError;
    use std::net::Ipv4Addr;

    const CONFIG: &str = r#"
rules:
  - ruleset: local
    local: { v4: 10.0.0.0/8, v6: "2001:db8::/32" }
    remote: { v4: 0.0.0.0/0, v6: "64:ff9b::/96" }
  - ruleset: remote
    local: { v4: 10.0.0.0/8, v6: "2001:db8::/32" }
    remote: { v4: 192.168.1.77/24, v6: "64:ff9b::/96" }
  - ruleset: local
    local: { v4: 172.16.0.0/12 }
    remote: { v4: 0.0.0.0/0 }
"#;

    #[test]
    fn test_config_parse() {
        let config = XlateConfig::from_yaml(CONFIG).expect("Should parse");
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].ruleset, RulesetKind::Local);
        assert_eq!(config.rules[1].ruleset, RulesetKind::Remote);
        // host bits are dropped
        assert_eq!(config.rules[1].remote.v4.to_string(), "192.168.1.0/24");
        // missing IPv6 side
        assert_eq!(config.rules[2].local.v6, Ipv6Prefix::ROOT);
        assert!(!config.rules[2].local.has_v6());

        let yaml = config.to_yaml().unwrap();
        assert_eq!(XlateConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_config_parse_invalid() {
        assert!(matches!(
            XlateConfig::from_yaml("rules:\n  - ruleset: both\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            XlateConfig::from_yaml(
                "rules:\n  - ruleset: local\n    local: { v4: 10.0.0.0/33 }\n    remote: { v4: 0.0.0.0/0 }\n"
            ),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(XlateConfig::from_yaml("{}").unwrap(), XlateConfig::default());
    }

    #[test]
    fn test_config_apply() {
        let ctx = XlateContext::alloc().unwrap();
        let config = XlateConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.apply(&ctx).unwrap(), 3);
        assert_eq!(ctx.rule_count(RulesetKind::Local), 2);
        assert_eq!(ctx.rule_count(RulesetKind::Remote), 1);
        assert_eq!(
            ctx.lookup_v4(RulesetKind::Remote, &Ipv4Addr::new(192, 168, 1, 1)),
            Some(config.rules[1].rule())
        );

        // applying again conflicts on the first entry
        let err = config.apply(&ctx).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Apply {
                index: 0,
                source: XlateError::Conflict(_, TrieError::EntryExists)
            }
        ));
    }

    #[test]
    fn test_config_apply_partial() {
        let ctx = XlateContext::alloc().unwrap();
        let mut config = XlateConfig::from_yaml(CONFIG).unwrap();
        let mut dup = config.rules[0];
        dup.local.v4 = "11.0.0.0/8".parse().unwrap();
        config.rules.insert(1, dup);

        let err = config.apply(&ctx).unwrap_err();
        assert!(matches!(err, ConfigError::Apply { index: 1, .. }));
        assert_eq!(ctx.rule_count(RulesetKind::Local), 1);
        assert_eq!(ctx.rule_count(RulesetKind::Remote), 0);
        assert_eq!(config.rules[0].local.v4.len(), 8);
    }
}
