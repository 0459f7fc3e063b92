//! current-status snapshot: the single newest status record from the phone.
//!
//! The phone writes numbers sometimes as JSON numbers and sometimes as
//! strings ("5.2", "---"), so every numeric field is read leniently.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Timestamp, Trend};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// mg/dL
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sgv: Option<f64>,
    /// mg/dL change over the last reading interval
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient_trend")]
    pub trend: Option<Trend>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub iob: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cob: Option<f64>,
    /// U/hour
    #[serde(default, deserialize_with = "lenient_f64")]
    pub basal: Option<f64>,
    /// 0 until the first status arrives
    #[serde(default, deserialize_with = "lenient_ts")]
    pub ts: Timestamp,
}

/// what an incoming status did to the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotChange {
    pub updated: bool,
    pub basal_changed: bool,
}

impl StatusSnapshot {
    pub fn has_data(&self) -> bool {
        self.ts > 0
    }

    /// Replace the snapshot wholesale if `incoming` is newer.
    pub fn apply(&mut self, incoming: StatusSnapshot) -> SnapshotChange {
        if incoming.ts <= self.ts {
            return SnapshotChange::default();
        }
        let basal_changed = incoming.basal.is_some() && incoming.basal != self.basal;
        *self = incoming;
        SnapshotChange { updated: true, basal_changed }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

fn lenient_ts<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).map(|v| v.round() as Timestamp).unwrap_or(0))
}

fn lenient_trend<'de, D>(deserializer: D) -> Result<Option<Trend>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => {
            serde_json::from_value(serde_json::Value::String(s)).ok()
        }
        _ => None,
    })
}

fn number_from_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
