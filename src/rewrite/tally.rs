// src/rewrite/tally.rs
//! Per-rule change counters
//!
//! A [`FileTally`] is produced for every file and merged into the run
//! summary. Merging is a per-key sum, so the aggregate does not depend on the
//! order in which workers finish.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

/// Identifier of a rewrite rule, in catalogue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// `<tree>` element renamed to `<list>`
    TreeToList,
    /// `attrs="{...}"` domains turned into expression attributes
    AttrsConversion,
    /// `states="..."` turned into an `invisible` expression
    StatesConversion,
    /// daterange widget options updated
    DaterangeUpdate,
    /// discussion panel collapsed to `<chatter/>`
    ChatterSimplified,
    /// settings block restructured into `<app>/<block>/<setting>`
    SettingsStructure,
    /// `view_mode` values in source or action records
    SourceViewMode,
}

impl RuleId {
    /// All rules in catalogue order
    pub const ALL: [RuleId; 7] = [
        Self::TreeToList,
        Self::AttrsConversion,
        Self::StatesConversion,
        Self::DaterangeUpdate,
        Self::ChatterSimplified,
        Self::SettingsStructure,
        Self::SourceViewMode,
    ];

    /// Key used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TreeToList => "tree_to_list",
            Self::AttrsConversion => "attrs_conversion",
            Self::StatesConversion => "states_conversion",
            Self::DaterangeUpdate => "daterange_update",
            Self::ChatterSimplified => "chatter_simplified",
            Self::SettingsStructure => "settings_structure",
            Self::SourceViewMode => "source_view_mode",
        }
    }

    /// Short label for the summary table
    pub fn label(&self) -> &'static str {
        match self {
            Self::TreeToList => "tree -> list",
            Self::AttrsConversion => "attrs",
            Self::StatesConversion => "states",
            Self::DaterangeUpdate => "daterange",
            Self::ChatterSimplified => "chatter",
            Self::SettingsStructure => "settings",
            Self::SourceViewMode => "view_mode",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.as_str() == s)
            .ok_or_else(|| format!("Unknown rule: {}", s))
    }
}

/// Counters for a single rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCount {
    /// Fragments the rule recognized
    pub found: u64,
    /// Fragments actually rewritten
    pub changed: u64,
    /// Fragments left as-is because they could not be translated
    pub unconverted: u64,
    /// Ambiguous or residual fragments that were kept
    pub warnings: u64,
    /// Rule invocations that failed outright
    pub errors: u64,
}

impl RuleCount {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for RuleCount {
    fn add_assign(&mut self, rhs: Self) {
        self.found += rhs.found;
        self.changed += rhs.changed;
        self.unconverted += rhs.unconverted;
        self.warnings += rhs.warnings;
        self.errors += rhs.errors;
    }
}

impl Add for RuleCount {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// Counters for every rule that touched a file (or a whole run)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTally {
    rules: BTreeMap<RuleId, RuleCount>,
}

impl FileTally {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, rule: RuleId) -> &mut RuleCount {
        self.rules.entry(rule).or_default()
    }

    /// Record `n` recognized fragments
    pub fn found(&mut self, rule: RuleId, n: u64) {
        self.entry(rule).found += n;
    }

    /// Record `n` rewritten fragments
    pub fn changed(&mut self, rule: RuleId, n: u64) {
        self.entry(rule).changed += n;
    }

    /// Record a recognized-and-rewritten fragment
    pub fn hit(&mut self, rule: RuleId) {
        let count = self.entry(rule);
        count.found += 1;
        count.changed += 1;
    }

    /// Record a fragment kept because translation failed
    pub fn unconverted(&mut self, rule: RuleId) {
        let count = self.entry(rule);
        count.found += 1;
        count.unconverted += 1;
    }

    pub fn warning(&mut self, rule: RuleId) {
        self.entry(rule).warnings += 1;
    }

    pub fn error(&mut self, rule: RuleId) {
        self.entry(rule).errors += 1;
    }

    /// Counters for one rule (zero when the rule never fired)
    pub fn get(&self, rule: RuleId) -> RuleCount {
        self.rules.get(&rule).copied().unwrap_or_default()
    }

    /// Shorthand for `get(rule).changed`
    pub fn changes(&self, rule: RuleId) -> u64 {
        self.get(rule).changed
    }

    pub fn total_changed(&self) -> u64 {
        self.rules.values().map(|c| c.changed).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.rules.values().map(|c| c.errors).sum()
    }

    pub fn total_warnings(&self) -> u64 {
        self.rules.values().map(|c| c.warnings + c.unconverted).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(RuleCount::is_zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, RuleCount)> + '_ {
        self.rules.iter().map(|(rule, count)| (*rule, *count))
    }

    /// Sum another tally into this one
    pub fn merge(&mut self, other: &FileTally) {
        for (rule, count) in other.iter() {
            *self.entry(rule) += count;
        }
    }
}

impl AddAssign<&FileTally> for FileTally {
    fn add_assign(&mut self, rhs: &FileTally) {
        self.merge(rhs);
    }
}

impl Add for FileTally {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.merge(&rhs);
        self
    }
}

impl std::iter::Sum for FileTally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(FileTally::new(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u64) -> FileTally {
        let mut tally = FileTally::new();
        tally.changed(RuleId::TreeToList, seed);
        tally.found(RuleId::TreeToList, seed + 1);
        if seed % 2 == 0 {
            tally.unconverted(RuleId::AttrsConversion);
        }
        if seed % 3 == 0 {
            tally.hit(RuleId::ChatterSimplified);
            tally.warning(RuleId::SettingsStructure);
        }
        tally
    }

    #[test]
    fn test_rule_id_roundtrip() {
        for rule in RuleId::ALL {
            assert_eq!(rule.as_str().parse::<RuleId>().unwrap(), rule);
        }
        assert!("nope".parse::<RuleId>().is_err());
    }

    #[test]
    fn test_merge_sums_per_key() {
        let mut total = sample(2);
        total.merge(&sample(3));

        assert_eq!(total.get(RuleId::TreeToList).changed, 5);
        assert_eq!(total.get(RuleId::TreeToList).found, 7);
        assert_eq!(total.get(RuleId::AttrsConversion).unconverted, 1);
        assert_eq!(total.get(RuleId::ChatterSimplified).changed, 1);
        assert_eq!(total.get(RuleId::DaterangeUpdate), RuleCount::default());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let tallies: Vec<FileTally> = (0..6).map(sample).collect();
        let forward: FileTally = tallies.iter().cloned().sum();
        let backward: FileTally = tallies.iter().rev().cloned().sum();

        // (a + b) + c == a + (b + c)
        let left = (tallies[0].clone() + tallies[1].clone()) + tallies[2].clone();
        let right = tallies[0].clone() + (tallies[1].clone() + tallies[2].clone());

        assert_eq!(forward, backward);
        assert_eq!(left, right);
    }

    #[test]
    fn test_totals() {
        let tally = sample(6);
        assert_eq!(tally.total_changed(), 7);
        assert_eq!(tally.total_warnings(), 2);
        assert_eq!(tally.total_errors(), 0);
        assert!(!tally.is_empty());
        assert!(FileTally::new().is_empty());
    }

    #[test]
    fn test_serializes_with_rule_keys() {
        let mut tally = FileTally::new();
        tally.hit(RuleId::StatesConversion);
        let json = serde_json::to_value(&tally).unwrap();
        assert_eq!(json["states_conversion"]["changed"], 1);
    }
}
