// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations for translation objects

use crate::context::Rulesets;
use crate::rule::{Association, RuleId, RulePair, RulesetKind};
use crate::ruleset::Ruleset;
use std::fmt::Display;

const LINE_WIDTH: usize = 81;

struct Heading(String);
impl Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = LINE_WIDTH.saturating_sub(self.0.len() + 2) / 2;
        write!(f, " {0:─<width$}", "─", width = len)?;
        write!(f, " {} ", self.0)?;
        writeln!(f, " {0:─<width$}", "─", width = len)
    }
}

impl Display for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <-> {}", self.v4, self.v6)
    }
}

impl Display for RulePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "local {} remote {}", self.local, self.remote)
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("#{}", self.as_u64()))
    }
}

impl Display for RulesetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesetKind::Local => write!(f, "local"),
            RulesetKind::Remote => write!(f, "remote"),
        }
    }
}

impl Display for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("{} rules ({})", self.kind(), self.len())).fmt(f)?;
        for (id, rule) in self.iter() {
            writeln!(f, " {id:>6} {rule}")?;
        }
        Ok(())
    }
}

impl Display for Rulesets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.local.fmt(f)?;
        self.remote.fmt(f)
    }
}
