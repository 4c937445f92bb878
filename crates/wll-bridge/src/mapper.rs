//! Transmitter/field selection.
//!
//! A WLL can track several transmitters of the same kind (two ISS units, a
//! second leaf/soil station). For every canonical field the mapper picks
//! exactly one source block:
//!
//! 1. the block whose logical id matches the configured preference for its
//!    kind, if that block reports the field;
//! 2. otherwise the block with the lowest logical id (blocks without an id
//!    last, then payload order).
//!
//! Blocks whose value for a field is absent or a sentinel do not compete for
//! that field.

use std::collections::BTreeMap;
use std::fmt;

use crate::conditions::{BlockKind, ConditionBlock, IssConditions};
use crate::error::AcquisitionError;
use crate::normalize::{normalize, FieldKind, Reading, StormCounter};
use crate::record::CanonicalField;

pub use crate::conditions::BlockSource;

/// Preferred logical id per block kind, from configuration.
pub type BindingHints = BTreeMap<BlockKind, u32>;

/// Raw value chosen for a canonical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selected {
    pub raw: f64,
    pub kind: FieldKind,
    pub source: BlockSource,
}

/// Which block supplies which field; recomputed every poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitterBinding(BTreeMap<CanonicalField, BlockSource>);

impl TransmitterBinding {
    pub fn source(&self, field: CanonicalField) -> Option<BlockSource> {
        self.0.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransmitterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_source: BTreeMap<BlockSource, Vec<&str>> = BTreeMap::new();
        for (field, source) in &self.0 {
            by_source.entry(*source).or_default().push(field.name());
        }
        let parts: Vec<String> = by_source
            .iter()
            .map(|(source, fields)| format!("{} -> [{}]", source, fields.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Result of field selection for one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSelection {
    pub fields: BTreeMap<CanonicalField, Selected>,
    /// Storm counter of the ISS used for rain accumulation.
    pub storm: Option<StormCounter>,
}

impl FieldSelection {
    /// Normalized value for every selected field.
    pub fn readings(&self) -> BTreeMap<CanonicalField, Reading> {
        self.fields
            .iter()
            .map(|(field, sel)| (*field, normalize(Some(sel.raw), sel.kind)))
            .collect()
    }

    pub fn binding(&self) -> TransmitterBinding {
        TransmitterBinding(
            self.fields
                .iter()
                .map(|(field, sel)| (*field, sel.source))
                .collect(),
        )
    }
}

// ── Field tables ────────────────────────────────────────────────────

/// Canonical fields a block can supply, with their raw values.
fn supplied_fields(block: &ConditionBlock) -> Vec<(CanonicalField, Option<f64>, FieldKind)> {
    use CanonicalField as F;
    use FieldKind as K;

    match block {
        ConditionBlock::Iss(b) => {
            let rain = K::RainCounts(b.rain_collector());
            vec![
                (F::OutTemp, b.temp, K::Temperature),
                (F::OutHumidity, b.hum, K::Humidity),
                (F::Dewpoint, b.dew_point, K::Temperature),
                (F::Heatindex, b.heat_index, K::Temperature),
                (F::Windchill, b.wind_chill, K::Temperature),
                (F::WindSpeed, b.wind_speed_last, K::WindSpeed),
                (F::WindDir, b.wind_dir_last, K::WindDirection),
                (F::WindGust, b.wind_speed_hi_last_10_min, K::WindSpeed),
                (F::WindGustDir, b.wind_dir_scalar_avg_last_10_min, K::WindDirection),
                (F::RainRate, b.rain_rate_last, rain),
                (F::DayRain, b.rainfall_daily, rain),
                (F::StormRain, b.rain_storm, rain),
                (F::Radiation, b.solar_rad, K::SolarRadiation),
                (F::Uv, b.uv_index, K::UvIndex),
                (F::TxBatteryStatus, b.trans_battery_flag, K::Status),
            ]
        }
        ConditionBlock::LeafSoil(b) => vec![
            (F::SoilTemp1, b.temp_1, K::Temperature),
            (F::SoilTemp2, b.temp_2, K::Temperature),
            (F::SoilTemp3, b.temp_3, K::Temperature),
            (F::SoilTemp4, b.temp_4, K::Temperature),
            (F::SoilMoist1, b.moist_soil_1, K::SoilMoisture),
            (F::SoilMoist2, b.moist_soil_2, K::SoilMoisture),
            (F::SoilMoist3, b.moist_soil_3, K::SoilMoisture),
            (F::SoilMoist4, b.moist_soil_4, K::SoilMoisture),
            (F::LeafWet1, b.wet_leaf_1, K::LeafWetness),
            (F::LeafWet2, b.wet_leaf_2, K::LeafWetness),
        ],
        ConditionBlock::Barometer(b) => vec![
            (F::Barometer, b.bar_sea_level, K::Pressure),
            (F::Pressure, b.bar_absolute, K::Pressure),
        ],
        ConditionBlock::Inside(b) => vec![
            (F::InTemp, b.temp_in, K::Temperature),
            (F::InHumidity, b.hum_in, K::Humidity),
            (F::InDewpoint, b.dew_point_in, K::Temperature),
        ],
    }
}

/// Block indices in tie-break order for the given hints.
fn preference_order(blocks: &[ConditionBlock], hints: &BindingHints) -> Vec<usize> {
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&i| {
        let block = &blocks[i];
        let id = block.logical_id();
        let preferred = hints.get(&block.kind()).is_some_and(|p| id == Some(*p));
        (!preferred, id.is_none(), id, i)
    });
    order
}

/// Choose one source block per canonical field.
///
/// Fails with [`AcquisitionError::Mapping`] when no recognized block is present.
pub fn select_fields(
    blocks: &[ConditionBlock],
    hints: &BindingHints,
) -> Result<FieldSelection, AcquisitionError> {
    if blocks.is_empty() {
        return Err(AcquisitionError::Mapping(
            "no recognized condition blocks in payload".to_string(),
        ));
    }

    let mut selection = FieldSelection::default();
    // ISS that supplied `stormRain`, else the first one with a collector
    // (its counter may be idle or invalid).
    let mut storm_block = None;
    let mut fallback_storm_block = None;

    for i in preference_order(blocks, hints) {
        let block = &blocks[i];
        let source = block.source();

        for (field, raw, kind) in supplied_fields(block) {
            if selection.fields.contains_key(&field) {
                continue;
            }
            if let (Some(raw), Reading::Value(_)) = (raw, normalize(raw, kind)) {
                selection.fields.insert(field, Selected { raw, kind, source });
                if field == CanonicalField::StormRain {
                    storm_block = Some(i);
                }
            }
        }

        if fallback_storm_block.is_none() {
            if let ConditionBlock::Iss(iss) = block {
                if iss.rain_collector().is_some() {
                    fallback_storm_block = Some(i);
                }
            }
        }
    }

    selection.storm = storm_block
        .or(fallback_storm_block)
        .and_then(|i| match &blocks[i] {
            ConditionBlock::Iss(iss) => storm_counter(iss, blocks[i].source()),
            _ => None,
        });

    Ok(selection)
}

fn storm_counter(iss: &IssConditions, source: BlockSource) -> Option<StormCounter> {
    let collector = iss.rain_collector()?;
    Some(StormCounter {
        source,
        counts: iss.rain_storm,
        start_at: iss.rain_storm_start_at,
        collector: Some(collector),
    })
}
