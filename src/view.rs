//! What a renderer gets to see.
//!
//! `RenderInput` is a read-only borrow of the snapshot and the three history
//! buffers. `FaceView` turns that into the strings and flags the face shows;
//! drawing them is left to whatever display sits on top.

use serde::Serialize;

use crate::domain::{
    mgdl_to_mmol, BasalSample, GlucoseSample, Timestamp, TreatmentSample, Trend, HIGH_MMOL, LOW_MMOL,
    MINUTE_MS,
};
use crate::history::HistoryData;
use crate::snapshot::StatusSnapshot;

const PLACEHOLDER: &str = "---";

#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub snapshot: &'a StatusSnapshot,
    pub glucose: &'a [GlucoseSample],
    pub treatments: &'a [TreatmentSample],
    pub basals: &'a [BasalSample],
}

impl<'a> RenderInput<'a> {
    pub fn new(snapshot: &'a StatusSnapshot, history: &'a HistoryData) -> Self {
        Self {
            snapshot,
            glucose: history.glucose.as_slice(),
            treatments: history.treatments.as_slice(),
            basals: history.basals.as_slice(),
        }
    }
}

pub fn out_of_range(mmol: f64) -> bool {
    mmol >= HIGH_MMOL || mmol <= LOW_MMOL
}

/// one point of the glucose line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraphPoint {
    /// 0.0 at the start of the retention window, 1.0 at `now`
    pub x: f64,
    pub mmol: f64,
    pub in_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceView {
    pub glucose: String,
    pub glucose_out_of_range: bool,
    /// minutes since the status reading, only when more than one
    pub age_minutes: Option<i64>,
    /// reading older than five minutes, drawn dimmed
    pub reading_old: bool,
    pub delta: String,
    pub trend: Option<Trend>,
    pub basal: String,
    pub cob: String,
    pub iob: String,
    /// "glucose treatments basals" buffer lengths, a debugging aid on the face
    pub buffer_lengths: String,
    pub graph: Vec<GraphPoint>,
    pub boluses: Vec<f64>,
}

impl FaceView {
    pub fn build(input: &RenderInput<'_>, now: Timestamp, window_ms: Timestamp) -> Self {
        let snap = input.snapshot;
        let mmol = snap.sgv.map(mgdl_to_mmol);

        let age = snap
            .has_data()
            .then(|| ((now - snap.ts) as f64 / MINUTE_MS as f64).round() as i64);

        let start = now - window_ms;
        let position = |ts: Timestamp| (ts - start) as f64 / window_ms as f64;

        Self {
            glucose: mmol.map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{v:.1}")),
            glucose_out_of_range: mmol.is_some_and(out_of_range),
            age_minutes: age.filter(|m| *m > 1),
            reading_old: age.map_or(true, |m| m > 5),
            delta: snap.delta.map(format_delta).unwrap_or_default(),
            trend: snap.trend,
            basal: format!("BAS: {}", snap.basal.map_or_else(|| PLACEHOLDER.to_string(), |b| b.to_string())),
            cob: format!("COB: {}", snap.cob.map_or_else(|| PLACEHOLDER.to_string(), |c| c.round().to_string())),
            iob: format!("IOB: {}", snap.iob.map_or_else(|| PLACEHOLDER.to_string(), |i| i.to_string())),
            buffer_lengths: format!(
                "{} {} {}",
                input.glucose.len(),
                input.treatments.len(),
                input.basals.len()
            ),
            graph: input
                .glucose
                .iter()
                .filter(|s| s.ts >= start && s.ts <= now)
                .map(|s| GraphPoint {
                    x: position(s.ts),
                    mmol: s.mmol(),
                    in_range: !out_of_range(s.mmol()),
                })
                .collect(),
            boluses: input
                .treatments
                .iter()
                .filter(|t| t.ts > start && t.ts < now && t.bolus_units().is_some())
                .map(|t| position(t.ts))
                .collect(),
        }
    }
}

/// signed mmol/L delta with one decimal, e.g. "+0.3", "-1.0"
pub fn format_delta(delta_mgdl: f64) -> String {
    let rounded = (10.0 * mgdl_to_mmol(delta_mgdl)).round() / 10.0;
    // avoid "-0.0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:+.1}")
}
