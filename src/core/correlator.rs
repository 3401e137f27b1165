// src/core/correlator.rs
use serde::{Deserialize, Serialize};

use super::diff::{ChangeKind, ChangeSet};

/// How one line relates to the changes in one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCorrelation {
    /// The queried line (0 when the frame carried no line number)
    pub line_number: u32,

    /// The exact line was changed
    pub is_changed: bool,

    /// The line falls inside an estimated hunk range
    pub is_in_change_range: bool,

    /// A changed line lies within the proximity window
    pub is_near_changes: bool,

    /// Set only on a direct match
    pub change_type: Option<ChangeKind>,

    /// Changed lines within the proximity window, ascending
    pub nearby_change_lines: Vec<u32>,
}

impl LineCorrelation {
    /// Changed directly or inside a hunk range
    pub fn touches_change(&self) -> bool {
        self.is_changed || self.is_in_change_range
    }
}

/// Correlates stack-frame lines with a parsed diff
#[derive(Debug, Clone, Copy)]
pub struct LineCorrelator {
    proximity: u32,
}

impl LineCorrelator {
    pub fn new(proximity: u32) -> Self {
        Self { proximity }
    }

    pub fn proximity(&self) -> u32 {
        self.proximity
    }

    /// Correlate `line_number` against `change_set` with the configured proximity.
    pub fn correlate(&self, line_number: Option<u32>, change_set: &ChangeSet) -> LineCorrelation {
        Self::correlate_within(line_number, change_set, self.proximity)
    }

    /// Correlate with an explicit proximity window.
    ///
    /// A direct match wins outright and skips the range and proximity checks,
    /// so a changed line is never reported as "near" itself.
    pub fn correlate_within(line_number: Option<u32>, change_set: &ChangeSet, proximity: u32) -> LineCorrelation {
        let line_number = match line_number {
            Some(line) if line > 0 => line,
            _ => return LineCorrelation::default(),
        };

        let mut correlation = LineCorrelation {
            line_number,
            ..LineCorrelation::default()
        };

        if let Some(kind) = change_set.change_at(line_number) {
            correlation.is_changed = true;
            correlation.is_in_change_range = true;
            correlation.change_type = Some(kind);
            return correlation;
        }

        correlation.is_in_change_range = change_set.hunks.iter().any(|h| h.contains(line_number));

        // changed_lines is a BTreeMap, so the collected lines are already sorted
        correlation.nearby_change_lines = change_set
            .changed_lines
            .keys()
            .copied()
            .filter(|changed| changed.abs_diff(line_number) <= proximity)
            .collect();
        correlation.is_near_changes = !correlation.nearby_change_lines.is_empty();

        correlation
    }
}

impl Default for LineCorrelator {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::DiffParser;

    const DIFF: &str = "@@ -42,7 +42,8 @@
 fun handle(event: Event) {
     val customer = repository.find(event.customerId)
+    val account = customer.account
     process(customer)
 }";

    fn change_set() -> ChangeSet {
        DiffParser::default().parse(Some(DIFF))
    }

    #[test]
    fn test_direct_line_match() {
        let c = LineCorrelator::default().correlate(Some(44), &change_set());

        assert!(c.is_changed);
        assert!(c.is_in_change_range);
        assert_eq!(c.change_type, Some(ChangeKind::Added));
        assert!(!c.is_near_changes);
        assert!(c.nearby_change_lines.is_empty());
    }

    #[test]
    fn test_proximity_without_direct_match() {
        let c = LineCorrelator::new(5).correlate(Some(40), &change_set());

        assert!(!c.is_changed);
        assert!(c.is_near_changes);
        assert!(!c.is_in_change_range);
        assert_eq!(c.nearby_change_lines, vec![44]);
        assert!(c.change_type.is_none());
    }

    #[test]
    fn test_in_range_but_far_from_changes() {
        let c = LineCorrelator::new(5).correlate(Some(60), &change_set());

        assert!(c.is_in_change_range);
        assert!(!c.is_near_changes);
        assert!(!c.is_changed);
    }

    #[test]
    fn test_direct_match_ignores_proximity_setting() {
        let cs = change_set();
        for proximity in [0, 1, 5, 100] {
            let c = LineCorrelator::new(proximity).correlate(Some(44), &cs);
            assert!(c.is_changed, "proximity {}", proximity);
            assert!(!c.nearby_change_lines.contains(&44));
        }
    }

    #[test]
    fn test_per_query_proximity() {
        let cs = change_set();
        let correlator = LineCorrelator::new(5);

        assert!(!LineCorrelator::correlate_within(Some(40), &cs, 3).is_near_changes);
        assert_eq!(LineCorrelator::correlate_within(Some(40), &cs, 4).nearby_change_lines, vec![44]);
        assert_eq!(correlator.correlate(Some(40), &cs), LineCorrelator::correlate_within(Some(40), &cs, 5));
        for proximity in [0, 3, 50] {
            assert!(LineCorrelator::correlate_within(Some(44), &cs, proximity).is_changed);
        }
    }

    #[test]
    fn test_missing_or_zero_line_yields_zero_value() {
        let cs = change_set();
        assert_eq!(LineCorrelator::default().correlate(None, &cs), LineCorrelation::default());
        assert_eq!(LineCorrelator::default().correlate(Some(0), &cs), LineCorrelation::default());
    }

    #[test]
    fn test_nearby_lines_are_sorted() {
        let diff = "@@ -1,3 +1,6 @@\n+a\n x\n+b\n y\n+c\n z";
        let cs = DiffParser::default().parse(Some(diff));
        let c = LineCorrelator::new(3).correlate(Some(4), &cs);

        assert_eq!(c.nearby_change_lines, vec![1, 3, 5]);
    }

    #[test]
    fn test_empty_change_set() {
        let c = LineCorrelator::default().correlate(Some(10), &ChangeSet::default());
        assert_eq!(c.line_number, 10);
        assert!(!c.touches_change());
        assert!(!c.is_near_changes);
    }
}
