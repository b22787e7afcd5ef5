use crate::fields::RowField;
use std::collections::BTreeMap;

pub const ROW_MIN_PID_DIGITS: usize = 5;
pub const ROW_MAX_PID_DIGITS: usize = 19;
pub const ROW_MIN_UID_DIGITS: usize = 5;
pub const ROW_MAX_UID_DIGITS: usize = 20;

/// Column widths being measured during one display rebuild.
///
/// A cycle starts from the minimum widths and only ever grows. Rendering
/// never sees a `WidthCycle`; it reads the [`FieldWidths`] returned by
/// [`WidthCycle::finish`], so widths from a half-finished rebuild cannot leak
/// into a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthCycle {
    widths: BTreeMap<RowField, usize>,
    pid_digits: usize,
    uid_digits: usize,
}

impl WidthCycle {
    pub fn begin() -> Self {
        Self {
            widths: BTreeMap::new(),
            pid_digits: ROW_MIN_PID_DIGITS,
            uid_digits: ROW_MIN_UID_DIGITS,
        }
    }

    pub fn update(&mut self, field: RowField, width: usize) {
        let entry = self.widths.entry(field).or_insert(0);
        if width > *entry {
            *entry = width;
        }
    }

    /// Sizes the PID columns for the largest PID in the table.
    pub fn set_pid_column_width(&mut self, max_pid: i64) {
        self.pid_digits = digits_for(max_pid, ROW_MIN_PID_DIGITS, ROW_MAX_PID_DIGITS);
    }

    /// Sizes the UID column for the largest UID in the table. `u32::MAX` is
    /// the "no uid" sentinel and resets to the minimum.
    pub fn set_uid_column_width(&mut self, max_uid: u32) {
        if max_uid == u32::MAX {
            self.uid_digits = ROW_MIN_UID_DIGITS;
            return;
        }
        self.uid_digits = digits_for(i64::from(max_uid), ROW_MIN_UID_DIGITS, ROW_MAX_UID_DIGITS);
    }

    pub fn observe_pid(&mut self, pid: i64) {
        let digits = digits_for(pid, ROW_MIN_PID_DIGITS, ROW_MAX_PID_DIGITS);
        self.pid_digits = self.pid_digits.max(digits);
    }

    pub fn observe_uid(&mut self, uid: u32) {
        if uid == u32::MAX {
            return;
        }
        let digits = digits_for(i64::from(uid), ROW_MIN_UID_DIGITS, ROW_MAX_UID_DIGITS);
        self.uid_digits = self.uid_digits.max(digits);
    }

    pub fn finish(self) -> FieldWidths {
        FieldWidths {
            widths: self.widths,
            pid_digits: self.pid_digits,
            uid_digits: self.uid_digits,
        }
    }
}

impl Default for WidthCycle {
    fn default() -> Self {
        Self::begin()
    }
}

/// Frozen widths for rendering one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWidths {
    widths: BTreeMap<RowField, usize>,
    pid_digits: usize,
    uid_digits: usize,
}

impl FieldWidths {
    pub fn width(&self, field: RowField) -> Option<usize> {
        self.widths.get(&field).copied()
    }

    pub fn pid_digits(&self) -> usize {
        self.pid_digits
    }

    pub fn uid_digits(&self) -> usize {
        self.uid_digits
    }
}

impl Default for FieldWidths {
    fn default() -> Self {
        WidthCycle::begin().finish()
    }
}

fn digits_for(value: i64, min: usize, max: usize) -> usize {
    let digits = value.unsigned_abs().checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::{WidthCycle, ROW_MAX_PID_DIGITS, ROW_MIN_PID_DIGITS, ROW_MIN_UID_DIGITS};
    use crate::fields::RowField;

    #[test]
    fn widths_only_grow_within_a_cycle() {
        let mut cycle = WidthCycle::begin();
        cycle.update(RowField::USER, 6);
        cycle.update(RowField::USER, 3);
        cycle.update(RowField::USER, 11);
        let widths = cycle.finish();
        assert_eq!(widths.width(RowField::USER), Some(11));
        assert_eq!(widths.width(RowField::COMM), None);
    }

    #[test]
    fn pid_digits_are_clamped_to_bounds() {
        let mut cycle = WidthCycle::begin();
        cycle.set_pid_column_width(42);
        assert_eq!(cycle.clone().finish().pid_digits(), ROW_MIN_PID_DIGITS);
        cycle.set_pid_column_width(4_194_304);
        assert_eq!(cycle.clone().finish().pid_digits(), 7);
        cycle.set_pid_column_width(i64::MAX);
        assert_eq!(cycle.finish().pid_digits(), ROW_MAX_PID_DIGITS);
    }

    #[test]
    fn uid_sentinel_resets_to_minimum() {
        let mut cycle = WidthCycle::begin();
        cycle.set_uid_column_width(1_000_000);
        assert_eq!(cycle.clone().finish().uid_digits(), 7);
        cycle.set_uid_column_width(u32::MAX);
        assert_eq!(cycle.finish().uid_digits(), ROW_MIN_UID_DIGITS);
    }

    #[test]
    fn observed_pids_grow_monotonically() {
        let mut cycle = WidthCycle::begin();
        cycle.observe_pid(1_234_567);
        cycle.observe_pid(12);
        assert_eq!(cycle.finish().pid_digits(), 7);
    }

    #[test]
    fn a_new_cycle_starts_from_minimum() {
        let mut cycle = WidthCycle::begin();
        cycle.observe_pid(123_456_789);
        let _ = cycle.finish();
        assert_eq!(WidthCycle::begin().finish().pid_digits(), ROW_MIN_PID_DIGITS);
    }
}
