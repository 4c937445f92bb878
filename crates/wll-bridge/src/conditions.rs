//! Current-conditions payload decoding.
//!
//! The device answers `GET /v1/current_conditions` with:
//!
//! ```text
//! {
//!   "data": {
//!     "did": "001D0A700002",
//!     "ts": 1531754005,
//!     "conditions": [
//!       { "lsid": 48308, "data_structure_type": 1, "txid": 1, "temp": 62.7, ... },
//!       { "lsid": 3187671188, "data_structure_type": 2, "txid": 3, "temp_1": null, ... },
//!       { "lsid": 48307, "data_structure_type": 3, "bar_sea_level": 30.008, ... },
//!       { "lsid": 48306, "data_structure_type": 4, "temp_in": 78.0, ... }
//!     ]
//!   },
//!   "error": null
//! }
//! ```
//!
//! Each element of `conditions` is decoded into a typed [`ConditionBlock`]
//! according to its `data_structure_type`. Unknown types are skipped so new
//! firmware blocks don't break older bridges, and unknown fields are ignored.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::error::AcquisitionError;
use crate::normalize::RainCollector;

// ── Block kinds ─────────────────────────────────────────────────────

/// The `data_structure_type` discriminant of a condition block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// 1: ISS current conditions (outdoor temp/hum, wind, rain, solar, UV)
    Iss,
    /// 2: Leaf/soil moisture station
    LeafSoil,
    /// 3: LSS barometer
    Barometer,
    /// 4: LSS inside temperature/humidity
    Inside,
}

impl BlockKind {
    pub fn from_type(data_structure_type: u64) -> Option<Self> {
        match data_structure_type {
            1 => Some(Self::Iss),
            2 => Some(Self::LeafSoil),
            3 => Some(Self::Barometer),
            4 => Some(Self::Inside),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iss => "iss",
            Self::LeafSoil => "leaf_soil",
            Self::Barometer => "barometer",
            Self::Inside => "inside",
        };
        f.write_str(name)
    }
}

// ── Typed blocks ────────────────────────────────────────────────────

/// ISS block. Temperatures °F, wind mph, rain in bucket counts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IssConditions {
    pub lsid: Option<u32>,
    pub txid: Option<u32>,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub dew_point: Option<f64>,
    pub heat_index: Option<f64>,
    pub wind_chill: Option<f64>,
    pub wind_speed_last: Option<f64>,
    pub wind_dir_last: Option<f64>,
    pub wind_speed_hi_last_10_min: Option<f64>,
    pub wind_dir_scalar_avg_last_10_min: Option<f64>,
    /// Rain collector code, see [`RainCollector::from_code`].
    pub rain_size: Option<u8>,
    /// counts/hour
    pub rain_rate_last: Option<f64>,
    pub rainfall_daily: Option<f64>,
    pub rain_storm: Option<f64>,
    pub rain_storm_start_at: Option<i64>,
    pub solar_rad: Option<f64>,
    pub uv_index: Option<f64>,
    pub trans_battery_flag: Option<f64>,
}

impl IssConditions {
    pub fn rain_collector(&self) -> Option<RainCollector> {
        self.rain_size.and_then(RainCollector::from_code)
    }
}

/// Leaf/soil station block. Soil temperature °F, moisture in centibar.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LeafSoilConditions {
    pub lsid: Option<u32>,
    pub txid: Option<u32>,
    pub temp_1: Option<f64>,
    pub temp_2: Option<f64>,
    pub temp_3: Option<f64>,
    pub temp_4: Option<f64>,
    pub moist_soil_1: Option<f64>,
    pub moist_soil_2: Option<f64>,
    pub moist_soil_3: Option<f64>,
    pub moist_soil_4: Option<f64>,
    pub wet_leaf_1: Option<f64>,
    pub wet_leaf_2: Option<f64>,
}

/// Barometer block, inHg.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BarometerConditions {
    pub lsid: Option<u32>,
    pub bar_sea_level: Option<f64>,
    pub bar_absolute: Option<f64>,
}

/// Inside temperature/humidity block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsideConditions {
    pub lsid: Option<u32>,
    pub temp_in: Option<f64>,
    pub hum_in: Option<f64>,
    pub dew_point_in: Option<f64>,
}

/// One decoded element of the `conditions` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionBlock {
    Iss(IssConditions),
    LeafSoil(LeafSoilConditions),
    Barometer(BarometerConditions),
    Inside(InsideConditions),
}

impl ConditionBlock {
    fn decode(kind: BlockKind, value: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            BlockKind::Iss => Self::Iss(IssConditions::deserialize(value)?),
            BlockKind::LeafSoil => Self::LeafSoil(LeafSoilConditions::deserialize(value)?),
            BlockKind::Barometer => Self::Barometer(BarometerConditions::deserialize(value)?),
            BlockKind::Inside => Self::Inside(InsideConditions::deserialize(value)?),
        })
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Iss(_) => BlockKind::Iss,
            Self::LeafSoil(_) => BlockKind::LeafSoil,
            Self::Barometer(_) => BlockKind::Barometer,
            Self::Inside(_) => BlockKind::Inside,
        }
    }

    /// Transmitter id for wireless blocks, logical sensor id otherwise.
    pub fn logical_id(&self) -> Option<u32> {
        match self {
            Self::Iss(b) => b.txid.or(b.lsid),
            Self::LeafSoil(b) => b.txid.or(b.lsid),
            Self::Barometer(b) => b.lsid,
            Self::Inside(b) => b.lsid,
        }
    }

    pub fn source(&self) -> BlockSource {
        BlockSource {
            kind: self.kind(),
            logical_id: self.logical_id(),
        }
    }
}

/// Identity of the transmitter or sensor a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockSource {
    pub kind: BlockKind,
    pub logical_id: Option<u32>,
}

impl fmt::Display for BlockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.logical_id {
            Some(id) => write!(f, "{}#{}", self.kind, id),
            None => write!(f, "{}#?", self.kind),
        }
    }
}

// ── Payload ─────────────────────────────────────────────────────────

/// Decoded current-conditions response.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    /// Device id (`did`)
    pub device_id: Option<String>,
    /// Device timestamp, Unix seconds
    pub timestamp: Option<i64>,
    /// Recognized blocks in payload order
    pub blocks: Vec<ConditionBlock>,
}

/// Decode the device's JSON response into typed condition blocks.
///
/// Fails with [`AcquisitionError::Protocol`] when the device reports an
/// error object, and with [`AcquisitionError::Parse`] when `data.conditions`
/// is absent or not an array, or a known block has wrongly-typed fields.
pub fn parse_conditions(root: &Value) -> Result<Conditions, AcquisitionError> {
    if let Some(err) = root.get("error").filter(|e| !e.is_null()) {
        let status = err
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(AcquisitionError::Protocol { status, message });
    }

    let data = root
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| AcquisitionError::Parse("missing `data` object".to_string()))?;

    let conditions = data
        .get("conditions")
        .ok_or_else(|| AcquisitionError::Parse("missing `data.conditions`".to_string()))?
        .as_array()
        .ok_or_else(|| AcquisitionError::Parse("`data.conditions` is not an array".to_string()))?;

    let mut blocks = Vec::with_capacity(conditions.len());
    for (index, condition) in conditions.iter().enumerate() {
        let Some(type_code) = condition.get("data_structure_type").and_then(Value::as_u64) else {
            log::warn!("Skipping condition {index}: no data_structure_type");
            continue;
        };
        let Some(kind) = BlockKind::from_type(type_code) else {
            log::debug!("Skipping condition {index}: unknown data_structure_type {type_code}");
            continue;
        };
        let block = ConditionBlock::decode(kind, condition).map_err(|e| {
            AcquisitionError::Parse(format!("condition {index} ({kind}): {e}"))
        })?;
        blocks.push(block);
    }

    Ok(Conditions {
        device_id: data.get("did").and_then(Value::as_str).map(str::to_string),
        timestamp: data.get("ts").and_then(Value::as_i64),
        blocks,
    })
}
