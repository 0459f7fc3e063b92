//! ==============================================================================
//! buffer.rs - time-windowed sample buffer
//! ==============================================================================
//!
//! purpose:
//!     an ordered, timestamp-unique, time-windowed collection of samples of one
//!     kind. this is what the graph on the watch face is drawn from.
//!
//! invariants (hold after every public call):
//!     - entries are strictly ascending by `ts` (no two share a timestamp)
//!     - a later write with an existing `ts` replaces the earlier one
//!     - after a call with a cutoff, no entry has `ts < cutoff`
//!
//! two ways in:
//!     - insert_sorted: one sample at a time (the live status feed)
//!     - merge_batch:   a whole unordered batch at once (the history feed)
//!
//! relationships:
//!     - used by: history.rs (one buffer per stream), view.rs (read-only slices)
//!
//! ==============================================================================

use std::collections::BTreeMap;

use crate::domain::{ChangeKey, Sample, Timestamp};

/// whether an insert may be suppressed when it repeats the previous value
pub enum InsertPolicy<T> {
    Always,
    /// skip the sample if its key equals the key of the entry right before it
    OnlyIfChanged(ChangeKey<T>),
}

// derives would demand `T: Copy`; the payload is a fn pointer either way
impl<T> Clone for InsertPolicy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InsertPolicy<T> {}

impl<T> InsertPolicy<T> {
    fn repeats(&self, previous: &T, new: &T) -> bool {
        match self {
            InsertPolicy::Always => false,
            InsertPolicy::OnlyIfChanged(key) => key(previous) == key(new),
        }
    }
}

impl<T> std::fmt::Debug for InsertPolicy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertPolicy::Always => f.write_str("Always"),
            InsertPolicy::OnlyIfChanged(_) => f.write_str("OnlyIfChanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer<T> {
    entries: Vec<T>,
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Sample> SampleBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_ts(&self) -> Option<Timestamp> {
        self.entries.first().map(Sample::ts)
    }

    pub fn last_ts(&self) -> Option<Timestamp> {
        self.entries.last().map(Sample::ts)
    }

    /// Insert one sample, keeping the buffer sorted and timestamp-unique, then
    /// evict everything older than `cutoff`. A `None` cutoff skips eviction.
    pub fn insert_sorted(&mut self, sample: T, cutoff: Option<Timestamp>, policy: InsertPolicy<T>) {
        self.insert_without_eviction(sample, policy);
        if let Some(cutoff) = cutoff {
            self.evict_before(cutoff);
        }
        self.debug_check_order();
    }

    fn insert_without_eviction(&mut self, sample: T, policy: InsertPolicy<T>) {
        let ts = sample.ts();
        let Some(last) = self.entries.last_mut() else {
            self.entries.push(sample);
            return;
        };

        // fast path: live data nearly always lands at the end
        if ts >= last.ts() {
            if ts == last.ts() {
                *last = sample;
            } else if !policy.repeats(last, &sample) {
                self.entries.push(sample);
            }
            return;
        }

        match self.entries.binary_search_by_key(&ts, Sample::ts) {
            Ok(index) => self.entries[index] = sample,
            Err(index) => {
                let repeats = index > 0 && policy.repeats(&self.entries[index - 1], &sample);
                if !repeats {
                    self.entries.insert(index, sample);
                }
            }
        }
    }

    /// Drop every entry with `ts < cutoff`. Returns how many were dropped.
    pub fn evict_before(&mut self, cutoff: Timestamp) -> usize {
        let expired = self.entries.partition_point(|s| s.ts() < cutoff);
        self.entries.drain(..expired);
        expired
    }

    /// Merge a whole batch at once.
    ///
    /// Existing entries and the batch are laid into a map keyed by timestamp
    /// (batch entries win, later batch entries win over earlier ones), keys
    /// below `cutoff` are dropped and the rest is written back in ascending
    /// order. With `OnlyIfChanged`, runs of equal keys collapse to their first
    /// entry, across existing entries as well as the batch; `insert_sorted`
    /// only checks the new sample's predecessor, so the two can differ.
    pub fn merge_batch<I>(&mut self, batch: I, cutoff: Option<Timestamp>, policy: InsertPolicy<T>)
    where
        I: IntoIterator<Item = T>,
    {
        let mut by_ts: BTreeMap<Timestamp, T> =
            self.entries.drain(..).map(|s| (s.ts(), s)).collect();
        for sample in batch {
            by_ts.insert(sample.ts(), sample);
        }
        if let Some(cutoff) = cutoff {
            by_ts = by_ts.split_off(&cutoff);
        }

        self.entries = by_ts.into_values().collect();
        if let InsertPolicy::OnlyIfChanged(key) = policy {
            self.entries.dedup_by(|later, earlier| key(later) == key(earlier));
        }
        self.debug_check_order();
    }

    fn debug_check_order(&self) {
        debug_assert!(
            self.entries.windows(2).all(|w| w[0].ts() < w[1].ts()),
            "sample buffer lost its ordering"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BasalSample, GlucoseSample};

    fn bg(ts: Timestamp, sgv: f64) -> GlucoseSample {
        GlucoseSample { ts, sgv }
    }

    fn basal(ts: Timestamp, rate: f64) -> BasalSample {
        BasalSample { ts, rate }
    }

    fn timestamps<T: Sample>(buffer: &SampleBuffer<T>) -> Vec<Timestamp> {
        buffer.as_slice().iter().map(Sample::ts).collect()
    }

    const ONLY_IF_RATE_CHANGED: InsertPolicy<BasalSample> =
        InsertPolicy::OnlyIfChanged(BasalSample::rate_key);

    #[test]
    fn empty_buffer_takes_first_sample() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(100, 90.0), None, InsertPolicy::Always);
        assert_eq!(buf.as_slice(), &[bg(100, 90.0)]);
    }

    #[test]
    fn out_of_order_inserts_commute() {
        let mut a = SampleBuffer::new();
        a.insert_sorted(bg(100, 1.0), None, InsertPolicy::Always);
        a.insert_sorted(bg(50, 2.0), None, InsertPolicy::Always);

        let mut b = SampleBuffer::new();
        b.insert_sorted(bg(50, 2.0), None, InsertPolicy::Always);
        b.insert_sorted(bg(100, 1.0), None, InsertPolicy::Always);

        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.as_slice(), &[bg(50, 2.0), bg(100, 1.0)]);
    }

    #[test]
    fn inserts_in_the_middle() {
        let mut buf = SampleBuffer::new();
        for ts in [100, 300, 400, 200, 150] {
            buf.insert_sorted(bg(ts, ts as f64), None, InsertPolicy::Always);
        }
        assert_eq!(timestamps(&buf), vec![100, 150, 200, 300, 400]);
    }

    #[test]
    fn exact_timestamp_overwrites_last() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(100, 90.0), None, InsertPolicy::Always);
        buf.insert_sorted(bg(200, 95.0), None, InsertPolicy::Always);
        buf.insert_sorted(bg(200, 110.0), None, InsertPolicy::Always);
        assert_eq!(buf.as_slice(), &[bg(100, 90.0), bg(200, 110.0)]);
    }

    #[test]
    fn exact_timestamp_overwrites_in_the_middle() {
        let mut buf = SampleBuffer::new();
        for ts in [100, 200, 300] {
            buf.insert_sorted(bg(ts, 1.0), None, InsertPolicy::Always);
        }
        buf.insert_sorted(bg(200, 7.0), None, InsertPolicy::Always);
        assert_eq!(buf.as_slice(), &[bg(100, 1.0), bg(200, 7.0), bg(300, 1.0)]);
    }

    #[test]
    fn unchanged_rate_is_not_appended() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(basal(100, 2.0), None, ONLY_IF_RATE_CHANGED);

        buf.insert_sorted(basal(160, 2.0), None, ONLY_IF_RATE_CHANGED);
        assert_eq!(buf.len(), 1);

        buf.insert_sorted(basal(160, 3.0), None, ONLY_IF_RATE_CHANGED);
        assert_eq!(buf.as_slice(), &[basal(100, 2.0), basal(160, 3.0)]);
    }

    #[test]
    fn unchanged_rate_is_not_spliced_after_equal_predecessor() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(basal(100, 2.0), None, ONLY_IF_RATE_CHANGED);
        buf.insert_sorted(basal(300, 1.0), None, ONLY_IF_RATE_CHANGED);

        buf.insert_sorted(basal(200, 2.0), None, ONLY_IF_RATE_CHANGED);
        assert_eq!(timestamps(&buf), vec![100, 300]);

        buf.insert_sorted(basal(200, 0.5), None, ONLY_IF_RATE_CHANGED);
        assert_eq!(timestamps(&buf), vec![100, 200, 300]);
    }

    #[test]
    fn only_if_changed_still_overwrites_equal_timestamp() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(basal(100, 2.0), None, ONLY_IF_RATE_CHANGED);
        buf.insert_sorted(basal(100, 2.5), None, ONLY_IF_RATE_CHANGED);
        assert_eq!(buf.as_slice(), &[basal(100, 2.5)]);
    }

    #[test]
    fn evicts_below_cutoff_after_insert() {
        let mut buf = SampleBuffer::new();
        for ts in [100, 200, 300] {
            buf.insert_sorted(bg(ts, 1.0), None, InsertPolicy::Always);
        }
        buf.insert_sorted(bg(400, 1.0), Some(250), InsertPolicy::Always);
        assert_eq!(timestamps(&buf), vec![300, 400]);
    }

    #[test]
    fn cutoff_is_exclusive() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(100, 1.0), None, InsertPolicy::Always);
        buf.insert_sorted(bg(200, 1.0), Some(100), InsertPolicy::Always);
        assert_eq!(timestamps(&buf), vec![100, 200]);
    }

    #[test]
    fn inserted_sample_below_cutoff_is_evicted_too() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(500, 1.0), None, InsertPolicy::Always);
        buf.insert_sorted(bg(10, 1.0), Some(100), InsertPolicy::Always);
        assert_eq!(timestamps(&buf), vec![500]);
    }

    #[test]
    fn merge_batch_orders_and_overlays() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(200, 3.0), None, InsertPolicy::Always);
        buf.merge_batch([bg(300, 1.0), bg(100, 2.0)], Some(0), InsertPolicy::Always);
        assert_eq!(buf.as_slice(), &[bg(100, 2.0), bg(200, 3.0), bg(300, 1.0)]);

        buf.merge_batch([bg(200, 9.0)], Some(0), InsertPolicy::Always);
        assert_eq!(buf.as_slice()[1], bg(200, 9.0));
    }

    #[test]
    fn merge_batch_drops_expired_keys() {
        let mut buf = SampleBuffer::new();
        buf.insert_sorted(bg(50, 1.0), None, InsertPolicy::Always);
        buf.merge_batch([bg(80, 1.0), bg(150, 1.0)], Some(100), InsertPolicy::Always);
        assert_eq!(timestamps(&buf), vec![150]);
    }

    #[test]
    fn merge_batch_collapses_repeated_rates() {
        let mut buf = SampleBuffer::new();
        buf.merge_batch(
            [basal(100, 1.0), basal(200, 1.0), basal(300, 2.0), basal(400, 1.0)],
            None,
            ONLY_IF_RATE_CHANGED,
        );
        assert_eq!(timestamps(&buf), vec![100, 300, 400]);
    }

    #[test]
    fn merge_batch_collapse_covers_existing_entries() {
        // 300 repeats the rate that is in effect from 200, so it goes too;
        // insert_sorted only compares against the predecessor and keeps it
        let mut merged = SampleBuffer::new();
        merged.merge_batch([basal(100, 1.0), basal(300, 2.0)], None, ONLY_IF_RATE_CHANGED);
        merged.merge_batch([basal(200, 2.0)], None, ONLY_IF_RATE_CHANGED);
        assert_eq!(timestamps(&merged), vec![100, 200]);

        let mut inserted = SampleBuffer::new();
        for sample in [basal(100, 1.0), basal(300, 2.0), basal(200, 2.0)] {
            inserted.insert_sorted(sample, None, ONLY_IF_RATE_CHANGED);
        }
        assert_eq!(timestamps(&inserted), vec![100, 200, 300]);
    }
}
