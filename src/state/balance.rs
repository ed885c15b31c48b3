//! Per-identity point balance with derived tier metadata.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::state::tiers::{ThresholdTable, TierResolution};

/// A mutator was asked to go below zero or given a negative amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("point cannot be less than 0 (attempted {attempted})")]
pub struct OutOfRange {
    /// Offending argument or resulting total.
    pub attempted: i64,
}

/// Emitted when a mutation moves a balance to another tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChange {
    pub identity: Uuid,
    pub points: i64,
    pub from: TierResolution,
    pub to: TierResolution,
}

/// Mutable point record of one identity.
///
/// Only created by the cache from a successful store load.
#[derive(Debug)]
pub struct Balance {
    identity: Uuid,
    instance: u64,
    points: i64,
    table: Arc<ThresholdTable>,
    resolution: TierResolution,
    pretty_points: String,
    total_points_label: String,
    need_points_label: String,
    dirty: bool,
    outbox: Vec<TierChange>,
}

impl Balance {
    pub(crate) fn loaded(
        identity: Uuid,
        instance: u64,
        points: i64,
        table: Arc<ThresholdTable>,
    ) -> Self {
        let resolution = table.resolve(points);
        let mut balance = Self {
            identity,
            instance,
            points,
            table,
            resolution,
            pretty_points: String::new(),
            total_points_label: String::new(),
            need_points_label: String::new(),
            dirty: false,
            outbox: Vec::new(),
        };
        balance.refresh_labels();
        balance
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn tier_index(&self) -> Option<usize> {
        self.resolution.index
    }

    pub fn tier_group(&self) -> Option<&str> {
        self.resolution.group.as_deref()
    }

    /// Display name of the current tier, or the unranked label.
    pub fn tier_name(&self) -> &str {
        &self.resolution.display_name
    }

    pub fn resolution(&self) -> &TierResolution {
        &self.resolution
    }

    pub fn pretty_points(&self) -> &str {
        &self.pretty_points
    }

    /// Size of the current tier, or the max label in the final tier.
    pub fn total_points_label(&self) -> &str {
        &self.total_points_label
    }

    /// Points left before promotion, or the max label in the final tier.
    pub fn need_points_label(&self) -> &str {
        &self.need_points_label
    }

    /// Whether the balance changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overwrite the total.
    pub fn set_points(&mut self, points: i64) -> Result<Option<TierChange>, OutOfRange> {
        if points < 0 {
            return Err(OutOfRange { attempted: points });
        }
        Ok(self.apply(points))
    }

    /// Add `amount`, saturating at `i64::MAX`.
    pub fn add_points(&mut self, amount: i64) -> Result<Option<TierChange>, OutOfRange> {
        if amount < 0 {
            return Err(OutOfRange { attempted: amount });
        }
        Ok(self.apply(self.points.saturating_add(amount)))
    }

    /// Subtract `amount`; refuses to go below zero.
    pub fn remove_points(&mut self, amount: i64) -> Result<Option<TierChange>, OutOfRange> {
        if amount < 0 {
            return Err(OutOfRange { attempted: amount });
        }
        let remaining = self.points - amount;
        if remaining < 0 {
            return Err(OutOfRange {
                attempted: remaining,
            });
        }
        Ok(self.apply(remaining))
    }

    fn apply(&mut self, points: i64) -> Option<TierChange> {
        let next = self.table.resolve(points);
        let previous = std::mem::replace(&mut self.resolution, next);
        self.points = points;
        self.dirty = true;
        self.refresh_labels();

        if previous.index == self.resolution.index {
            return None;
        }
        let change = TierChange {
            identity: self.identity,
            points,
            from: previous,
            to: self.resolution.clone(),
        };
        self.outbox.push(change.clone());
        Some(change)
    }

    fn refresh_labels(&mut self) {
        let labels = self.table.labels();
        self.pretty_points = format_points(self.points);
        self.total_points_label = self
            .resolution
            .total_points()
            .map(format_points)
            .unwrap_or_else(|| labels.max_total.clone());
        self.need_points_label = self
            .resolution
            .need_points(self.points)
            .map(format_points)
            .unwrap_or_else(|| labels.max_need.clone());
    }

    /// Re-resolve against a freshly loaded ladder. Not a mutation: the
    /// balance stays clean and no tier change is queued.
    pub(crate) fn rebind(&mut self, table: Arc<ThresholdTable>) {
        self.resolution = table.resolve(self.points);
        self.table = table;
        self.refresh_labels();
    }

    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    pub(crate) fn take_tier_changes(&mut self) -> Vec<TierChange> {
        std::mem::take(&mut self.outbox)
    }

    /// Clear the dirty flag if nothing changed since `(instance, points)` was saved.
    pub(crate) fn clear_dirty_if_unchanged(&mut self, instance: u64, points: i64) -> bool {
        if self.instance == instance && self.points == points {
            self.dirty = false;
        }
        !self.dirty
    }
}

/// Render `points` with `,` as thousands separator.
pub fn format_points(points: i64) -> String {
    let digits = points.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if points < 0 {
        out.push('-');
    }
    for (position, digit) in digits.chars().enumerate() {
        if position > 0 && (digits.len() - position) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::groups::StaticGroupDirectory,
        state::tiers::{TierEntry, TierLabels},
    };

    fn table() -> Arc<ThresholdTable> {
        let entries = [("t0", 0), ("t1", 100), ("t2", 200)]
            .into_iter()
            .map(|(group, points)| TierEntry {
                group: group.into(),
                display_name: Some(group.to_uppercase()),
                points,
            })
            .collect::<Vec<_>>();
        let directory = StaticGroupDirectory::new(["t0", "t1", "t2"]);
        let labels = TierLabels {
            max_total: "MAX".into(),
            max_need: "-".into(),
            unranked: "none".into(),
        };
        Arc::new(
            ThresholdTable::build(&entries, &directory)
                .unwrap()
                .with_labels(labels),
        )
    }

    fn balance(points: i64) -> Balance {
        Balance::loaded(Uuid::new_v4(), 1, points, table())
    }

    #[test]
    fn loading_is_clean_and_silent() {
        let mut balance = balance(150);
        assert!(!balance.is_dirty());
        assert_eq!(balance.tier_name(), "T1");
        assert!(balance.take_tier_changes().is_empty());
    }

    #[test]
    fn add_then_remove_restores_points_but_stays_dirty() {
        let mut balance = balance(40);
        balance.add_points(25).unwrap();
        balance.remove_points(25).unwrap();
        assert_eq!(balance.points(), 40);
        assert!(balance.is_dirty());
    }

    #[test]
    fn remove_more_than_held_is_rejected() {
        let mut balance = balance(10);
        assert_eq!(
            balance.remove_points(11),
            Err(OutOfRange { attempted: -1 })
        );
        assert_eq!(balance.points(), 10);
        assert!(!balance.is_dirty());
    }

    #[test]
    fn negative_arguments_are_rejected() {
        let mut balance = balance(10);
        assert!(balance.set_points(-1).is_err());
        assert!(balance.add_points(-1).is_err());
        assert!(balance.remove_points(-1).is_err());
        assert!(!balance.is_dirty());

        balance.set_points(0).unwrap();
        assert_eq!(balance.points(), 0);
        balance.set_points(i64::MAX).unwrap();
        assert_eq!(balance.points(), i64::MAX);
    }

    #[test]
    fn addition_saturates() {
        let mut balance = balance(i64::MAX - 1);
        balance.add_points(10).unwrap();
        assert_eq!(balance.points(), i64::MAX);
    }

    #[test]
    fn crossing_a_threshold_reports_and_queues_the_change() {
        let mut balance = balance(90);
        assert_eq!(balance.add_points(5).unwrap(), None);

        let change = balance.add_points(5).unwrap().expect("tier change");
        assert_eq!(change.from.index, Some(0));
        assert_eq!(change.to.index, Some(1));
        assert_eq!(change.points, 100);

        assert_eq!(balance.take_tier_changes(), vec![change]);
        assert!(balance.take_tier_changes().is_empty());
    }

    #[test]
    fn labels_follow_the_ladder() {
        let mut balance = balance(1_250);
        assert_eq!(balance.pretty_points(), "1,250");
        assert_eq!(balance.total_points_label(), "MAX");
        assert_eq!(balance.need_points_label(), "-");

        balance.set_points(120).unwrap();
        assert_eq!(balance.total_points_label(), "200");
        assert_eq!(balance.need_points_label(), "180");
    }

    #[test]
    fn dirty_clears_only_for_the_saved_snapshot() {
        let mut balance = balance(0);
        balance.add_points(5).unwrap();
        let saved = balance.points();
        balance.add_points(1).unwrap();

        assert!(!balance.clear_dirty_if_unchanged(balance.instance(), saved));
        assert!(balance.is_dirty());
        assert!(!balance.clear_dirty_if_unchanged(99, balance.points()));
        assert!(balance.clear_dirty_if_unchanged(balance.instance(), balance.points()));
    }

    #[test]
    fn moves_below_the_first_tier_are_silent_until_a_tier_is_crossed() {
        let entries = [("t0", 50), ("t1", 50)]
            .into_iter()
            .map(|(group, points)| TierEntry {
                group: group.into(),
                display_name: None,
                points,
            })
            .collect::<Vec<_>>();
        let directory = StaticGroupDirectory::new(["t0", "t1"]);
        let table = Arc::new(ThresholdTable::build(&entries, &directory).unwrap());
        let mut balance = Balance::loaded(Uuid::new_v4(), 1, 10, table);
        assert_eq!(balance.tier_index(), None);

        assert_eq!(balance.add_points(5), Ok(None));
        assert!(balance.is_dirty());
        assert!(balance.take_tier_changes().is_empty());

        assert!(balance.add_points(45).unwrap().is_some());
        balance.take_tier_changes();

        let change = balance.remove_points(20).unwrap().unwrap();
        assert_eq!(change.from.index, Some(0));
        assert_eq!(change.to.index, None);
        assert_eq!(balance.take_tier_changes(), vec![change]);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_points(0), "0");
        assert_eq!(format_points(999), "999");
        assert_eq!(format_points(1_000), "1,000");
        assert_eq!(format_points(12_345_678), "12,345,678");
        assert_eq!(format_points(-4_200), "-4,200");
    }
}
