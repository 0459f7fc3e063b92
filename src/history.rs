//! ==============================================================================
//! history.rs - per-stream history buffers, watermarks and staleness
//! ==============================================================================
//!
//! purpose:
//!     owns one SampleBuffer per stream (glucose, treatments, basals) and
//!     decides how each source feeds them:
//!     - history batches go through the map-based merge
//!     - the live status snapshot is inserted one sample at a time, throttled
//!
//! staleness:
//!     a fresh HistoryData starts stale. while stale, the next history batch
//!     first wipes every buffer and watermark, so nothing from before a
//!     reconnect survives the resync.
//!
//! relationships:
//!     - uses: buffer.rs, domain.rs, snapshot.rs
//!     - used by: watchface.rs
//!
//! ==============================================================================

use tracing::{debug, info};

use crate::buffer::{InsertPolicy, SampleBuffer};
use crate::domain::{BasalSample, GlucoseSample, Sample, Timestamp, TreatmentSample};
use crate::snapshot::{SnapshotChange, StatusSnapshot};

/// the three history files the phone writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Glucose,
    Treatments,
    Basals,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Glucose, Stream::Treatments, Stream::Basals];

    pub fn file_name(self) -> &'static str {
        match self {
            Stream::Glucose => "aaps.history.bg",
            Stream::Treatments => "aaps.history.insulin",
            Stream::Basals => "aaps.history.basals",
        }
    }
}

/// a decoded history file
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryBatch {
    Glucose(Vec<GlucoseSample>),
    Treatments(Vec<TreatmentSample>),
    Basals(Vec<BasalSample>),
}

impl HistoryBatch {
    pub fn stream(&self) -> Stream {
        match self {
            HistoryBatch::Glucose(_) => Stream::Glucose,
            HistoryBatch::Treatments(_) => Stream::Treatments,
            HistoryBatch::Basals(_) => Stream::Basals,
        }
    }
}

/// how history is windowed and how often the live feed may add glucose points
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub window_ms: Timestamp,
    /// a status glucose value is buffered only if strictly more than this has
    /// passed since the last buffered glucose sample
    pub glucose_min_gap_ms: Timestamp,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window_ms: 90 * 60 * 1000,
            glucose_min_gap_ms: 270 * 1000,
        }
    }
}

impl RetentionPolicy {
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.window_ms
    }
}

const BASAL_POLICY: InsertPolicy<BasalSample> = InsertPolicy::OnlyIfChanged(BasalSample::rate_key);

#[derive(Debug, Clone)]
pub struct HistoryData {
    pub glucose: SampleBuffer<GlucoseSample>,
    pub treatments: SampleBuffer<TreatmentSample>,
    pub basals: SampleBuffer<BasalSample>,
    glucose_updated: Option<Timestamp>,
    treatments_updated: Option<Timestamp>,
    basals_updated: Option<Timestamp>,
    stale: bool,
}

impl Default for HistoryData {
    fn default() -> Self {
        Self {
            glucose: SampleBuffer::new(),
            treatments: SampleBuffer::new(),
            basals: SampleBuffer::new(),
            glucose_updated: None,
            treatments_updated: None,
            basals_updated: None,
            stale: true,
        }
    }
}

impl HistoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Request a full rebuild from the next history batch.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Clear every buffer and watermark.
    pub fn reset(&mut self) {
        *self = Self {
            stale: false,
            ..Self::default()
        };
    }

    pub fn watermark(&self, stream: Stream) -> Option<Timestamp> {
        match stream {
            Stream::Glucose => self.glucose_updated,
            Stream::Treatments => self.treatments_updated,
            Stream::Basals => self.basals_updated,
        }
    }

    fn watermark_mut(&mut self, stream: Stream) -> &mut Option<Timestamp> {
        match stream {
            Stream::Glucose => &mut self.glucose_updated,
            Stream::Treatments => &mut self.treatments_updated,
            Stream::Basals => &mut self.basals_updated,
        }
    }

    /// Merge a history batch. Samples at or below the stream's watermark are
    /// skipped. Returns how many samples were offered to the buffer.
    pub fn apply_batch(&mut self, batch: HistoryBatch, now: Timestamp, retention: &RetentionPolicy) -> usize {
        if self.stale {
            info!("history is stale, rebuilding from this batch");
            self.reset();
        }

        let stream = batch.stream();
        let watermark = self.watermark(stream);
        let cutoff = Some(retention.cutoff(now));

        let (accepted, newest) = match batch {
            HistoryBatch::Glucose(samples) => {
                let (fresh, newest) = newer_than(samples, watermark);
                let n = fresh.len();
                self.glucose.merge_batch(fresh, cutoff, InsertPolicy::Always);
                (n, newest)
            }
            HistoryBatch::Treatments(samples) => {
                let (fresh, newest) = newer_than(samples, watermark);
                let n = fresh.len();
                self.treatments.merge_batch(fresh, cutoff, InsertPolicy::Always);
                (n, newest)
            }
            HistoryBatch::Basals(samples) => {
                let (fresh, newest) = newer_than(samples, watermark);
                let n = fresh.len();
                self.basals.merge_batch(fresh, cutoff, BASAL_POLICY);
                (n, newest)
            }
        };

        if let Some(newest) = newest {
            let mark = self.watermark_mut(stream);
            *mark = Some(mark.map_or(newest, |m| m.max(newest)));
        }
        debug!(?stream, accepted, watermark = ?self.watermark(stream), "merged history batch");
        accepted
    }

    /// Feed the live snapshot into the buffers: a glucose point when enough
    /// time has passed since the last one, a basal point when the rate changed.
    pub fn record_status(
        &mut self,
        snapshot: &StatusSnapshot,
        change: SnapshotChange,
        now: Timestamp,
        retention: &RetentionPolicy,
    ) {
        if !change.updated || !snapshot.has_data() {
            return;
        }
        let cutoff = Some(retention.cutoff(now));

        if let Some(sgv) = snapshot.sgv {
            let due = match self.glucose.last_ts() {
                Some(last) => snapshot.ts - last > retention.glucose_min_gap_ms,
                None => true,
            };
            if due {
                self.glucose.insert_sorted(
                    GlucoseSample { ts: snapshot.ts, sgv },
                    cutoff,
                    InsertPolicy::Always,
                );
            }
        }

        if change.basal_changed {
            if let Some(rate) = snapshot.basal {
                debug!(ts = snapshot.ts, rate, "basal changed");
                self.basals
                    .insert_sorted(BasalSample { ts: snapshot.ts, rate }, cutoff, BASAL_POLICY);
            }
        }
    }

    /// Evict everything outside the window without inserting anything.
    pub fn prune(&mut self, now: Timestamp, retention: &RetentionPolicy) {
        let cutoff = retention.cutoff(now);
        self.glucose.evict_before(cutoff);
        self.treatments.evict_before(cutoff);
        self.basals.evict_before(cutoff);
    }
}

fn newer_than<T: Sample>(samples: Vec<T>, watermark: Option<Timestamp>) -> (Vec<T>, Option<Timestamp>) {
    let newest = samples.iter().map(Sample::ts).max();
    let fresh = match watermark {
        Some(mark) => samples.into_iter().filter(|s| s.ts() > mark).collect(),
        None => samples,
    };
    (fresh, newest)
}
