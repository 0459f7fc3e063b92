//! ==============================================================================
//! domain.rs - sample kinds and shared units
//! ==============================================================================
//!
//! purpose:
//!     defines the three timestamped sample kinds the watch face buffers
//!     (glucose, treatments, basal rates), the trend arrow reported by the
//!     phone, and the mg/dL -> mmol/L conversion used for display.
//!
//! relationships:
//!     - used by: buffer.rs (Sample trait), history.rs, mailbox.rs, view.rs
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// milliseconds since the unix epoch
pub type Timestamp = i64;

pub const MINUTE_MS: Timestamp = 60 * 1000;

/// divide a mg/dL value by this to get mmol/L
pub const MGDL_TO_MMOL: f64 = 18.0182;
pub const HIGH_MMOL: f64 = 10.0;
pub const LOW_MMOL: f64 = 4.0;

pub fn mgdl_to_mmol(mgdl: f64) -> f64 {
    mgdl / MGDL_TO_MMOL
}

/// anything that can live in a SampleBuffer
pub trait Sample: Clone {
    fn ts(&self) -> Timestamp;
}

/// extracts the field an only-if-changed insert compares
pub type ChangeKey<T> = fn(&T) -> Option<f64>;

/// a single sensor glucose reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSample {
    pub ts: Timestamp,
    /// sensor glucose value in mg/dL
    pub sgv: f64,
}

impl Sample for GlucoseSample {
    fn ts(&self) -> Timestamp {
        self.ts
    }
}

impl GlucoseSample {
    pub fn mmol(&self) -> f64 {
        mgdl_to_mmol(self.sgv)
    }
}

/// a bolus and/or carb entry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TreatmentSample {
    pub ts: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    /// bolus amount as reported by the phone's treatment history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl Sample for TreatmentSample {
    fn ts(&self) -> Timestamp {
        self.ts
    }
}

impl TreatmentSample {
    /// insulin delivered by this treatment, whichever field carried it
    pub fn bolus_units(&self) -> Option<f64> {
        self.insulin.or(self.amount).filter(|u| *u > 0.0)
    }
}

/// basal rate in effect from `ts` onwards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasalSample {
    pub ts: Timestamp,
    /// U/hour
    pub rate: f64,
}

impl Sample for BasalSample {
    fn ts(&self) -> Timestamp {
        self.ts
    }
}

impl BasalSample {
    pub fn rate_key(sample: &Self) -> Option<f64> {
        Some(sample.rate)
    }
}

/// direction of the glucose trend as reported by the phone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Flat,
    Up,
    Down,
    FortyFiveUp,
    FortyFiveDown,
    #[serde(other)]
    Unknown,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Flat => "→",
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::FortyFiveUp => "↗",
            Trend::FortyFiveDown => "↘",
            Trend::Unknown => "",
        }
    }
}

/// why a single inbound sample was rejected
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sample has no `ts` field")]
    MissingTimestamp,
    #[error("sample `ts` is not an integer: {0}")]
    BadTimestamp(serde_json::Value),
    #[error("malformed sample: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// parse one record of a history batch, insisting on an integer `ts`
pub fn parse_sample<T>(value: serde_json::Value) -> Result<T, SampleError>
where
    T: serde::de::DeserializeOwned,
{
    match value.get("ts") {
        None | Some(serde_json::Value::Null) => return Err(SampleError::MissingTimestamp),
        Some(ts) if ts.as_i64().is_none() => return Err(SampleError::BadTimestamp(ts.clone())),
        Some(_) => {}
    }
    Ok(serde_json::from_value(value)?)
}
