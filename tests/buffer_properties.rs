//! Property tests for the sample buffer and the history stale reset.

use std::collections::BTreeMap;

use proptest::prelude::*;

use aaps_watchface::buffer::{InsertPolicy, SampleBuffer};
use aaps_watchface::domain::{BasalSample, GlucoseSample, Sample, Timestamp, TreatmentSample};
use aaps_watchface::history::{HistoryBatch, HistoryData, RetentionPolicy};

const NOW: Timestamp = 10_000_000;

fn glucose() -> impl Strategy<Value = GlucoseSample> {
    (0i64..2_000, 40u16..400).prop_map(|(ts, sgv)| GlucoseSample { ts, sgv: f64::from(sgv) })
}

fn recent_glucose() -> impl Strategy<Value = GlucoseSample> {
    (NOW - 3_600_000..=NOW, 40u16..400).prop_map(|(ts, sgv)| GlucoseSample { ts, sgv: f64::from(sgv) })
}

fn basal() -> impl Strategy<Value = BasalSample> {
    (0i64..500, 0u8..3).prop_map(|(ts, rate)| BasalSample { ts, rate: f64::from(rate) })
}

/// rate in effect at `ts`: the last entry at or before it
fn rate_at(entries: &[BasalSample], ts: Timestamp) -> Option<f64> {
    entries.iter().rev().find(|s| s.ts <= ts).map(|s| s.rate)
}

fn timestamps<T: Sample>(buffer: &SampleBuffer<T>) -> Vec<Timestamp> {
    buffer.as_slice().iter().map(Sample::ts).collect()
}

/// what the buffer should hold: last write per timestamp, ascending
fn expected(samples: &[GlucoseSample], cutoff: Option<Timestamp>) -> Vec<GlucoseSample> {
    let by_ts: BTreeMap<_, _> = samples.iter().map(|s| (s.ts, *s)).collect();
    by_ts
        .into_values()
        .filter(|s| cutoff.map_or(true, |c| s.ts >= c))
        .collect()
}

proptest! {
    #[test]
    fn insert_keeps_buffer_strictly_ascending(samples in prop::collection::vec(glucose(), 0..64)) {
        let mut buffer = SampleBuffer::new();
        for sample in samples {
            buffer.insert_sorted(sample, None, InsertPolicy::Always);
            let ts = timestamps(&buffer);
            prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn last_write_wins_per_timestamp(samples in prop::collection::vec(glucose(), 0..64)) {
        let mut buffer = SampleBuffer::new();
        for sample in &samples {
            buffer.insert_sorted(*sample, None, InsertPolicy::Always);
        }
        let expected_samples = expected(&samples, None);
        prop_assert_eq!(buffer.as_slice(), expected_samples.as_slice());
    }

    #[test]
    fn nothing_survives_below_cutoff(
        samples in prop::collection::vec(glucose(), 1..64),
        cutoff in 0i64..2_000,
    ) {
        let mut buffer = SampleBuffer::new();
        for sample in samples {
            buffer.insert_sorted(sample, Some(cutoff), InsertPolicy::Always);
            prop_assert!(buffer.first_ts().map_or(true, |first| first >= cutoff));
        }
    }

    #[test]
    fn insertion_order_does_not_matter_for_distinct_timestamps(
        (ordered, shuffled) in prop::collection::btree_map(0i64..10_000, 40u16..400, 0..32)
            .prop_map(|m| m.into_iter().map(|(ts, sgv)| GlucoseSample { ts, sgv: f64::from(sgv) }).collect::<Vec<_>>())
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let mut a = SampleBuffer::new();
        let mut b = SampleBuffer::new();
        for sample in ordered {
            a.insert_sorted(sample, None, InsertPolicy::Always);
        }
        for sample in shuffled {
            b.insert_sorted(sample, None, InsertPolicy::Always);
        }
        prop_assert_eq!(a, b);
    }

    #[test]
    fn merge_matches_one_by_one_insertion(
        existing in prop::collection::vec(glucose(), 0..32),
        batch in prop::collection::vec(glucose(), 0..32),
        cutoff in prop::option::of(0i64..2_000),
    ) {
        let mut merged = SampleBuffer::new();
        merged.merge_batch(existing.iter().copied(), None, InsertPolicy::Always);
        merged.merge_batch(batch.iter().copied(), cutoff, InsertPolicy::Always);

        let mut inserted = SampleBuffer::new();
        for sample in existing.iter().chain(batch.iter()) {
            inserted.insert_sorted(*sample, cutoff, InsertPolicy::Always);
        }

        let all: Vec<_> = existing.iter().chain(batch.iter()).copied().collect();
        let expected_samples = expected(&all, cutoff);
        prop_assert_eq!(merged.as_slice(), expected_samples.as_slice());
        prop_assert_eq!(merged, inserted);
    }

    #[test]
    fn rate_merge_keeps_the_rate_in_effect(
        existing in prop::collection::vec(basal(), 0..32),
        batch in prop::collection::vec(basal(), 0..32),
    ) {
        let policy = InsertPolicy::OnlyIfChanged(BasalSample::rate_key);
        let mut merged = SampleBuffer::new();
        merged.merge_batch(existing.iter().copied(), None, policy);
        merged.merge_batch(batch.iter().copied(), None, policy);

        let entries = merged.as_slice();
        prop_assert!(entries.windows(2).all(|w| w[0].ts < w[1].ts && w[0].rate != w[1].rate));

        // the same overlay without collapsing: collapsing may drop entries but
        // never changes which rate is in effect at any of them
        let mut overlay = SampleBuffer::new();
        overlay.merge_batch(existing.iter().copied(), None, policy);
        overlay.merge_batch(batch.iter().copied(), None, InsertPolicy::Always);
        for sample in overlay.as_slice() {
            prop_assert_eq!(rate_at(entries, sample.ts), Some(sample.rate));
        }
    }

    #[test]
    fn stale_reset_leaves_only_the_fresh_batch(
        old in prop::collection::vec(recent_glucose(), 1..32),
        fresh in prop::collection::vec(recent_glucose(), 1..32),
    ) {
        let retention = RetentionPolicy::default();
        let mut history = HistoryData::new();
        history.apply_batch(HistoryBatch::Glucose(old), NOW, &retention);
        history.apply_batch(
            HistoryBatch::Treatments(vec![TreatmentSample { ts: NOW - 1_000, insulin: Some(1.0), ..Default::default() }]),
            NOW,
            &retention,
        );

        history.mark_stale();
        history.apply_batch(HistoryBatch::Glucose(fresh.clone()), NOW, &retention);

        let expected_samples = expected(&fresh, None);
        prop_assert_eq!(history.glucose.as_slice(), expected_samples.as_slice());
        prop_assert!(history.treatments.is_empty());
        prop_assert!(!history.is_stale());
    }
}

#[test]
fn batch_order_does_not_change_merge_result() {
    let sample = |ts, sgv| GlucoseSample { ts, sgv };
    let want = vec![sample(100, 2.0), sample(200, 3.0), sample(300, 1.0)];

    for batch in [
        vec![sample(300, 1.0), sample(100, 2.0)],
        vec![sample(100, 2.0), sample(300, 1.0)],
    ] {
        let mut buffer = SampleBuffer::new();
        buffer.insert_sorted(sample(200, 3.0), None, InsertPolicy::Always);
        buffer.merge_batch(batch, Some(0), InsertPolicy::Always);
        assert_eq!(buffer.as_slice(), want.as_slice());
    }
}
