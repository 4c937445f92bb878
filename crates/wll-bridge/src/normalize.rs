//! Raw sensor value normalization.
//!
//! The device reports US customary units already (°F, mph, inHg, W/m²), so
//! most kinds pass through untouched. Rain is the exception: the device
//! reports bucket tip counts, which are scaled to inches using the rain
//! collector size reported alongside them.
//!
//! "No data" arrives either as JSON `null` or as an out-of-range magic number
//! inherited from the Davis console formats. Both become [`Reading::Missing`].

use serde::{Serialize, Serializer};

use crate::conditions::BlockSource;

const MM_PER_INCH: f64 = 25.4;

// ── Reading ─────────────────────────────────────────────────────────

/// A canonical value, or an explicit marker for a sensor that did not report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    Value(f64),
    #[default]
    Missing,
}

impl Reading {
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Reading::Missing)
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reading::Missing, Reading::Value)
    }
}

/// Serialized as a number, or `null` when missing.
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

// ── Rain collector ──────────────────────────────────────────────────

/// Rain bucket size, from the ISS `rain_size` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainCollector {
    /// 0.01"
    HundredthInch,
    /// 0.2 mm
    FifthMillimeter,
    /// 0.1 mm
    TenthMillimeter,
    /// 0.001"
    ThousandthInch,
}

impl RainCollector {
    /// Decode the device's `rain_size` field. `0` is reserved.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::HundredthInch),
            2 => Some(Self::FifthMillimeter),
            3 => Some(Self::TenthMillimeter),
            4 => Some(Self::ThousandthInch),
            _ => None,
        }
    }

    /// Depth of rain represented by one bucket tip, in inches.
    pub fn inches_per_count(self) -> f64 {
        match self {
            Self::HundredthInch => 0.01,
            Self::FifthMillimeter => 0.2 / MM_PER_INCH,
            Self::TenthMillimeter => 0.1 / MM_PER_INCH,
            Self::ThousandthInch => 0.001,
        }
    }
}

// ── Field kinds ─────────────────────────────────────────────────────

/// Physical kind of a raw field; decides sentinels and scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// °F
    Temperature,
    /// %RH
    Humidity,
    /// mph
    WindSpeed,
    /// degrees
    WindDirection,
    /// inHg
    Pressure,
    /// W/m²
    SolarRadiation,
    UvIndex,
    /// centibar
    SoilMoisture,
    /// 0-15, no unit
    LeafWetness,
    /// Bucket tips (or tips/hour), scaled to inches by the collector size.
    RainCounts(Option<RainCollector>),
    /// Flags and codes, passed through.
    Status,
}

impl FieldKind {
    /// Device values meaning "sensor not reporting" for this kind.
    pub fn sentinels(self) -> &'static [f64] {
        match self {
            FieldKind::Temperature => &[32767.0, -32768.0],
            FieldKind::Humidity | FieldKind::WindSpeed => &[255.0, 32767.0],
            FieldKind::WindDirection | FieldKind::Pressure => &[32767.0, 65535.0],
            FieldKind::SolarRadiation => &[32767.0],
            FieldKind::UvIndex | FieldKind::SoilMoisture | FieldKind::LeafWetness => &[255.0],
            FieldKind::RainCounts(_) => &[65535.0],
            FieldKind::Status => &[],
        }
    }

    pub fn is_sentinel(self, raw: f64) -> bool {
        self.sentinels().contains(&raw)
    }
}

/// Convert a raw device value into the canonical unit for its kind.
///
/// Pure function of `(raw, kind)`. Values are never clamped; only absent,
/// non-finite, and sentinel values become [`Reading::Missing`].
pub fn normalize(raw: Option<f64>, kind: FieldKind) -> Reading {
    let Some(raw) = raw else {
        return Reading::Missing;
    };
    if !raw.is_finite() || kind.is_sentinel(raw) {
        return Reading::Missing;
    }

    match kind {
        FieldKind::RainCounts(Some(collector)) => {
            Reading::Value(raw * collector.inches_per_count())
        }
        FieldKind::RainCounts(None) => Reading::Missing,
        _ => Reading::Value(raw),
    }
}

// ── Rain accumulation ───────────────────────────────────────────────

/// Storm rain counter read from one ISS block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormCounter {
    /// ISS the counter was read from.
    pub source: BlockSource,
    /// Total tips since the storm started.
    pub counts: Option<f64>,
    /// Unix time the current storm started; `None` when no storm is active.
    pub start_at: Option<i64>,
    pub collector: Option<RainCollector>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    source: BlockSource,
    counts: f64,
    start_at: Option<i64>,
}

/// Turns the device's storm total into rain fallen since the previous tick.
///
/// Holds the last counter value only; it is owned by the poll loop and
/// starts empty on every process start. Counters from different ISS units
/// are never compared: a change of source starts a new baseline.
#[derive(Debug, Default)]
pub struct RainAccumulator {
    last: Option<Baseline>,
}

impl RainAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rain since the previous observation, in inches.
    ///
    /// The first observation from a source only establishes a baseline and
    /// yields 0.
    pub fn update(&mut self, storm: Option<&StormCounter>) -> Reading {
        let Some(storm) = storm else {
            return Reading::Missing;
        };
        let Some(collector) = storm.collector else {
            return Reading::Missing;
        };
        let kind = FieldKind::RainCounts(Some(collector));
        let counts = match (storm.counts, storm.start_at) {
            (Some(c), _) if !normalize(Some(c), kind).is_missing() => c,
            // No storm in progress
            (None, None) => 0.0,
            _ => return Reading::Missing,
        };

        let delta = match self.last {
            None => 0.0,
            Some(last) if last.source != storm.source => {
                log::info!(
                    "Rain counter source changed from {} to {}, new baseline",
                    last.source,
                    storm.source
                );
                0.0
            }
            Some(last) if last.start_at != storm.start_at => counts,
            Some(last) if counts >= last.counts => counts - last.counts,
            Some(_) => 0.0,
        };
        self.last = Some(Baseline {
            source: storm.source,
            counts,
            start_at: storm.start_at,
        });

        Reading::Value(delta * collector.inches_per_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::BlockKind;

    fn approx(reading: Reading, expected: f64) {
        let v = reading.value().expect("expected a value");
        assert!((v - expected).abs() < 1e-9, "{v} != {expected}");
    }

    #[test]
    fn test_absent_is_missing() {
        assert_eq!(normalize(None, FieldKind::Temperature), Reading::Missing);
    }

    #[test]
    fn test_sentinels_are_missing() {
        let kinds = [
            FieldKind::Temperature,
            FieldKind::Humidity,
            FieldKind::WindSpeed,
            FieldKind::WindDirection,
            FieldKind::Pressure,
            FieldKind::SolarRadiation,
            FieldKind::UvIndex,
            FieldKind::SoilMoisture,
            FieldKind::LeafWetness,
            FieldKind::RainCounts(Some(RainCollector::HundredthInch)),
        ];
        for kind in kinds {
            for &s in kind.sentinels() {
                assert_eq!(normalize(Some(s), kind), Reading::Missing, "{kind:?} {s}");
            }
        }
    }

    #[test]
    fn test_non_finite_is_missing() {
        assert_eq!(normalize(Some(f64::NAN), FieldKind::Status), Reading::Missing);
        assert_eq!(
            normalize(Some(f64::INFINITY), FieldKind::Temperature),
            Reading::Missing
        );
    }

    #[test]
    fn test_plausible_values_pass_through_unclamped() {
        assert_eq!(normalize(Some(68.4), FieldKind::Temperature), Reading::Value(68.4));
        assert_eq!(normalize(Some(-40.0), FieldKind::Temperature), Reading::Value(-40.0));
        // Extreme but not a sentinel: kept as data.
        assert_eq!(normalize(Some(140.0), FieldKind::Humidity), Reading::Value(140.0));
        assert_eq!(normalize(Some(0.0), FieldKind::WindSpeed), Reading::Value(0.0));
        assert_eq!(normalize(Some(255.0), FieldKind::Status), Reading::Value(255.0));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let kind = FieldKind::RainCounts(Some(RainCollector::FifthMillimeter));
        let a = normalize(Some(17.0), kind);
        let b = normalize(Some(17.0), kind);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rain_scaling_per_collector() {
        approx(
            normalize(Some(10.0), FieldKind::RainCounts(Some(RainCollector::HundredthInch))),
            0.1,
        );
        approx(
            normalize(Some(10.0), FieldKind::RainCounts(Some(RainCollector::FifthMillimeter))),
            2.0 / 25.4,
        );
        approx(
            normalize(Some(10.0), FieldKind::RainCounts(Some(RainCollector::TenthMillimeter))),
            1.0 / 25.4,
        );
        approx(
            normalize(Some(10.0), FieldKind::RainCounts(Some(RainCollector::ThousandthInch))),
            0.01,
        );
    }

    #[test]
    fn test_rain_without_collector_is_missing() {
        assert_eq!(
            normalize(Some(3.0), FieldKind::RainCounts(None)),
            Reading::Missing
        );
    }

    #[test]
    fn test_collector_codes() {
        assert_eq!(RainCollector::from_code(0), None);
        assert_eq!(RainCollector::from_code(1), Some(RainCollector::HundredthInch));
        assert_eq!(RainCollector::from_code(4), Some(RainCollector::ThousandthInch));
        assert_eq!(RainCollector::from_code(5), None);
    }

    #[test]
    fn test_reading_serializes_as_number_or_null() {
        assert_eq!(serde_json::to_string(&Reading::Value(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&Reading::Missing).unwrap(), "null");
    }

    fn iss(txid: u32) -> BlockSource {
        BlockSource {
            kind: BlockKind::Iss,
            logical_id: Some(txid),
        }
    }

    fn storm_from(txid: u32, counts: f64, start_at: Option<i64>) -> StormCounter {
        StormCounter {
            source: iss(txid),
            counts: Some(counts),
            start_at,
            collector: Some(RainCollector::HundredthInch),
        }
    }

    fn storm(counts: f64, start_at: Option<i64>) -> StormCounter {
        storm_from(1, counts, start_at)
    }

    #[test]
    fn test_rain_accumulator_sequence() {
        let mut acc = RainAccumulator::new();

        // Baseline
        approx(acc.update(Some(&storm(5.0, Some(1000)))), 0.0);
        // Two more tips in the same storm
        approx(acc.update(Some(&storm(7.0, Some(1000)))), 0.02);
        // No change
        approx(acc.update(Some(&storm(7.0, Some(1000)))), 0.0);
        // New storm: everything counted so far is new rain
        approx(acc.update(Some(&storm(3.0, Some(2000)))), 0.03);
        // Counter went backwards within a storm: no rain
        approx(acc.update(Some(&storm(1.0, Some(2000)))), 0.0);
    }

    #[test]
    fn test_rain_accumulator_storm_starting_from_idle() {
        let mut acc = RainAccumulator::new();
        approx(acc.update(Some(&storm(0.0, None))), 0.0);
        approx(acc.update(Some(&storm(4.0, Some(3000)))), 0.04);
    }

    #[test]
    fn test_rain_accumulator_idle_counter_is_zero() {
        let mut acc = RainAccumulator::new();
        let idle = StormCounter {
            counts: None,
            start_at: None,
            ..storm(0.0, None)
        };
        approx(acc.update(Some(&idle)), 0.0);
        approx(acc.update(Some(&storm(2.0, Some(500)))), 0.02);

        let no_collector = StormCounter {
            collector: None,
            ..storm(3.0, Some(500))
        };
        assert_eq!(acc.update(Some(&no_collector)), Reading::Missing);
    }

    #[test]
    fn test_rain_accumulator_missing_counter_keeps_baseline() {
        let mut acc = RainAccumulator::new();
        approx(acc.update(Some(&storm(5.0, Some(1000)))), 0.0);

        let gap = storm(65535.0, Some(1000));
        assert_eq!(acc.update(Some(&gap)), Reading::Missing);
        assert_eq!(acc.update(None), Reading::Missing);

        approx(acc.update(Some(&storm(6.0, Some(1000)))), 0.01);
    }

    #[test]
    fn test_rain_accumulator_source_change_starts_new_baseline() {
        let mut acc = RainAccumulator::new();

        approx(acc.update(Some(&storm_from(1, 10.0, Some(500)))), 0.0);
        // ISS 1 drops out; ISS 2 has a much larger storm total of its own.
        approx(acc.update(Some(&storm_from(2, 200.0, Some(900)))), 0.0);
        // ISS 1 returns with two more tips than its last reading.
        approx(acc.update(Some(&storm_from(1, 12.0, Some(500)))), 0.0);
        // Same source again: deltas resume.
        approx(acc.update(Some(&storm_from(1, 15.0, Some(500)))), 0.03);
    }

    #[test]
    fn test_rain_accumulator_invalid_counter_from_new_source_keeps_baseline() {
        let mut acc = RainAccumulator::new();
        approx(acc.update(Some(&storm_from(1, 10.0, Some(500)))), 0.0);
        assert_eq!(
            acc.update(Some(&storm_from(2, 65535.0, Some(900)))),
            Reading::Missing
        );
        approx(acc.update(Some(&storm_from(1, 11.0, Some(500)))), 0.01);
    }
}
