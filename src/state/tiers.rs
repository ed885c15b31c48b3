//! Tier ladder: cumulative thresholds built from per-tier costs and point resolution.

use std::{collections::HashSet, path::PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dao::groups::GroupDirectory;

/// Invalid configuration detected at startup or reload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tier list is empty")]
    EmptyTiers,
    #[error("tier `{group}` has a negative cost ({cost})")]
    NegativeCost { group: String, cost: i64 },
    #[error("cumulative threshold overflows at tier `{group}`")]
    ThresholdOverflow { group: String },
    #[error("tier references unknown group `{group}`")]
    UnknownGroup { group: String },
    #[error("group `{group}` is used by more than one tier")]
    DuplicateGroup { group: String },
    #[error("failed to read config `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One authored rung of the ladder, as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierEntry {
    pub group: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Points needed on top of the previous tier; absolute for the first tier.
    pub points: i64,
}

/// Resolved rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub group: String,
    pub display_name: String,
    /// Cumulative points required to enter this tier.
    pub threshold: i64,
}

/// Placeholder texts rendered in place of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLabels {
    /// Shown as the tier span once the final tier is reached.
    pub max_total: String,
    /// Shown as the remaining points once the final tier is reached.
    pub max_need: String,
    /// Name shown below the first threshold.
    pub unranked: String,
}

impl Default for TierLabels {
    fn default() -> Self {
        Self {
            max_total: "max".into(),
            max_need: "max".into(),
            unranked: "unranked".into(),
        }
    }
}

/// Where a point total sits on the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierResolution {
    /// `None` below the first threshold.
    pub index: Option<usize>,
    pub group: Option<String>,
    pub display_name: String,
    /// Lower bound of the current tier (0 when unranked).
    pub floor: i64,
    /// Threshold of the next tier, `None` in the final tier.
    pub next_ceiling: Option<i64>,
}

impl TierResolution {
    /// Points spanned by the current tier.
    pub fn total_points(&self) -> Option<i64> {
        self.next_ceiling.map(|ceiling| ceiling - self.floor)
    }

    /// Points still missing to reach the next tier.
    pub fn need_points(&self, points: i64) -> Option<i64> {
        self.next_ceiling.map(|ceiling| ceiling - points)
    }
}

/// Immutable tier ladder shared by every cached balance.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    tiers: IndexMap<String, Tier>,
    thresholds: Vec<i64>,
    labels: TierLabels,
}

impl ThresholdTable {
    /// Validate `entries` in order and accumulate their costs.
    ///
    /// Group ids are matched case-insensitively against `directory`.
    pub fn build(
        entries: &[TierEntry],
        directory: &dyn GroupDirectory,
    ) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyTiers);
        }

        let known: HashSet<String> = directory.groups().into_iter().collect();
        let mut tiers = IndexMap::with_capacity(entries.len());
        let mut thresholds = Vec::with_capacity(entries.len());
        let mut running: i64 = 0;

        for entry in entries {
            let group = entry.group.trim().to_lowercase();
            if !known.contains(&group) {
                return Err(ConfigError::UnknownGroup { group });
            }
            if tiers.contains_key(&group) {
                return Err(ConfigError::DuplicateGroup { group });
            }
            if entry.points < 0 {
                return Err(ConfigError::NegativeCost {
                    group,
                    cost: entry.points,
                });
            }
            running = running
                .checked_add(entry.points)
                .ok_or_else(|| ConfigError::ThresholdOverflow {
                    group: group.clone(),
                })?;

            let display_name = entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.group.trim().to_string());
            thresholds.push(running);
            tiers.insert(
                group.clone(),
                Tier {
                    group,
                    display_name,
                    threshold: running,
                },
            );
        }

        Ok(Self {
            tiers,
            thresholds,
            labels: TierLabels::default(),
        })
    }

    pub fn with_labels(mut self, labels: TierLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Locate `points` on the ladder. Reaching a threshold exactly promotes.
    pub fn resolve(&self, points: i64) -> TierResolution {
        let reached = self.thresholds.partition_point(|threshold| *threshold <= points);
        match reached.checked_sub(1) {
            None => TierResolution {
                index: None,
                group: None,
                display_name: self.labels.unranked.clone(),
                floor: 0,
                next_ceiling: self.thresholds.first().copied(),
            },
            Some(index) => {
                let tier = &self.tiers[index];
                TierResolution {
                    index: Some(index),
                    group: Some(tier.group.clone()),
                    display_name: tier.display_name.clone(),
                    floor: tier.threshold,
                    next_ceiling: self.thresholds.get(index + 1).copied(),
                }
            }
        }
    }

    pub fn tier_by_group(&self, group: &str) -> Option<&Tier> {
        self.tiers.get(&group.trim().to_lowercase())
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.values()
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    pub fn labels(&self) -> &TierLabels {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::groups::StaticGroupDirectory;

    fn entry(group: &str, points: i64) -> TierEntry {
        TierEntry {
            group: group.into(),
            display_name: None,
            points,
        }
    }

    fn build(entries: &[TierEntry]) -> Result<ThresholdTable, ConfigError> {
        let directory = StaticGroupDirectory::new(entries.iter().map(|e| e.group.as_str()));
        ThresholdTable::build(entries, &directory)
    }

    #[test]
    fn costs_accumulate_into_thresholds() {
        let table = build(&[entry("t0", 0), entry("t1", 100), entry("t2", 200)]).unwrap();
        assert_eq!(table.thresholds(), &[0, 100, 300]);

        let cases = [
            (0, Some(0), Some(100)),
            (99, Some(0), Some(1)),
            (100, Some(1), Some(200)),
            (300, Some(2), None),
            (1_000_000, Some(2), None),
        ];
        for (points, index, need) in cases {
            let resolved = table.resolve(points);
            assert_eq!(resolved.index, index, "index at {points}");
            assert_eq!(resolved.need_points(points), need, "need at {points}");
        }
        assert_eq!(table.resolve(150).total_points(), Some(200));
    }

    #[test]
    fn below_first_threshold_is_unranked() {
        let table = build(&[entry("bronze", 50), entry("silver", 50)]).unwrap();
        let resolved = table.resolve(20);
        assert_eq!(resolved.index, None);
        assert_eq!(resolved.display_name, "unranked");
        assert_eq!(resolved.total_points(), Some(50));
        assert_eq!(resolved.need_points(20), Some(30));
    }

    #[test]
    fn zero_cost_tier_is_skipped_over() {
        let table = build(&[entry("a", 0), entry("b", 10), entry("c", 0), entry("d", 5)]).unwrap();
        assert_eq!(table.resolve(10).group.as_deref(), Some("c"));
        assert_eq!(table.resolve(10).need_points(10), Some(5));
        assert_eq!(table.resolve(9).need_points(9), Some(1));
    }

    #[test]
    fn display_name_falls_back_to_group() {
        let table = build(&[entry("Gold", 0)]).unwrap();
        assert_eq!(table.resolve(0).display_name, "Gold");
        assert!(table.tier_by_group("GOLD").is_some());
    }

    #[test]
    fn malformed_ladders_are_rejected() {
        assert!(matches!(build(&[]), Err(ConfigError::EmptyTiers)));
        assert!(matches!(
            build(&[entry("a", 0), entry("b", -1)]),
            Err(ConfigError::NegativeCost { cost: -1, .. })
        ));
        assert!(matches!(
            build(&[entry("a", i64::MAX), entry("b", 1)]),
            Err(ConfigError::ThresholdOverflow { .. })
        ));
        assert!(matches!(
            build(&[entry("a", 0), entry("A", 1)]),
            Err(ConfigError::DuplicateGroup { .. })
        ));

        let directory = StaticGroupDirectory::new(["a"]);
        assert!(matches!(
            ThresholdTable::build(&[entry("b", 0)], &directory),
            Err(ConfigError::UnknownGroup { .. })
        ));
    }
}
