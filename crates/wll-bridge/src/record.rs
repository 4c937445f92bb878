//! Canonical weather record handed to the host.
//!
//! Field names follow the weewx observation names so a host can consume the
//! record as a loop packet without renaming.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::Reading;

/// Every field a record carries, in serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    OutTemp,
    OutHumidity,
    Dewpoint,
    Heatindex,
    Windchill,
    WindSpeed,
    WindDir,
    WindGust,
    WindGustDir,
    RainRate,
    Rain,
    DayRain,
    StormRain,
    Radiation,
    Uv,
    TxBatteryStatus,
    SoilTemp1,
    SoilTemp2,
    SoilTemp3,
    SoilTemp4,
    SoilMoist1,
    SoilMoist2,
    SoilMoist3,
    SoilMoist4,
    LeafWet1,
    LeafWet2,
    Barometer,
    Pressure,
    InTemp,
    InHumidity,
    InDewpoint,
}

impl CanonicalField {
    pub const ALL: &'static [CanonicalField] = &[
        Self::OutTemp,
        Self::OutHumidity,
        Self::Dewpoint,
        Self::Heatindex,
        Self::Windchill,
        Self::WindSpeed,
        Self::WindDir,
        Self::WindGust,
        Self::WindGustDir,
        Self::RainRate,
        Self::Rain,
        Self::DayRain,
        Self::StormRain,
        Self::Radiation,
        Self::Uv,
        Self::TxBatteryStatus,
        Self::SoilTemp1,
        Self::SoilTemp2,
        Self::SoilTemp3,
        Self::SoilTemp4,
        Self::SoilMoist1,
        Self::SoilMoist2,
        Self::SoilMoist3,
        Self::SoilMoist4,
        Self::LeafWet1,
        Self::LeafWet2,
        Self::Barometer,
        Self::Pressure,
        Self::InTemp,
        Self::InHumidity,
        Self::InDewpoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OutTemp => "outTemp",
            Self::OutHumidity => "outHumidity",
            Self::Dewpoint => "dewpoint",
            Self::Heatindex => "heatindex",
            Self::Windchill => "windchill",
            Self::WindSpeed => "windSpeed",
            Self::WindDir => "windDir",
            Self::WindGust => "windGust",
            Self::WindGustDir => "windGustDir",
            Self::RainRate => "rainRate",
            Self::Rain => "rain",
            Self::DayRain => "dayRain",
            Self::StormRain => "stormRain",
            Self::Radiation => "radiation",
            Self::Uv => "UV",
            Self::TxBatteryStatus => "txBatteryStatus",
            Self::SoilTemp1 => "soilTemp1",
            Self::SoilTemp2 => "soilTemp2",
            Self::SoilTemp3 => "soilTemp3",
            Self::SoilTemp4 => "soilTemp4",
            Self::SoilMoist1 => "soilMoist1",
            Self::SoilMoist2 => "soilMoist2",
            Self::SoilMoist3 => "soilMoist3",
            Self::SoilMoist4 => "soilMoist4",
            Self::LeafWet1 => "leafWet1",
            Self::LeafWet2 => "leafWet2",
            Self::Barometer => "barometer",
            Self::Pressure => "pressure",
            Self::InTemp => "inTemp",
            Self::InHumidity => "inHumidity",
            Self::InDewpoint => "inDewpoint",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit system of an emitted record. Only US customary is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    /// °F, mph, inHg, inch, W/m²
    #[default]
    Us,
}

impl UnitSystem {
    /// weewx `usUnits` code
    pub fn code(self) -> u8 {
        match self {
            UnitSystem::Us => 1,
        }
    }
}

impl Serialize for UnitSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// One normalized observation. Every canonical field is present.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    /// Unix seconds
    pub date_time: i64,
    pub us_units: UnitSystem,
    values: BTreeMap<CanonicalField, Reading>,
}

impl WeatherRecord {
    pub fn get(&self, field: CanonicalField) -> Reading {
        self.values.get(&field).copied().unwrap_or_default()
    }

    /// Fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, Reading)> + '_ {
        self.values.iter().map(|(f, r)| (*f, *r))
    }

    /// Number of fields carrying a value.
    pub fn reported(&self) -> usize {
        self.values.values().filter(|r| !r.is_missing()).count()
    }
}

/// Flat object: `{"dateTime": .., "usUnits": 1, "outTemp": 68.4, "windDir": null, ..}`
impl Serialize for WeatherRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        map.serialize_entry("dateTime", &self.date_time)?;
        map.serialize_entry("usUnits", &self.us_units)?;
        for (field, reading) in &self.values {
            map.serialize_entry(field.name(), reading)?;
        }
        map.end()
    }
}

/// Assemble a record with the full schema.
///
/// Fields absent from `values` are filled with [`Reading::Missing`].
pub fn emit(values: &BTreeMap<CanonicalField, Reading>, timestamp: i64) -> WeatherRecord {
    let values = CanonicalField::ALL
        .iter()
        .map(|field| (*field, values.get(field).copied().unwrap_or_default()))
        .collect();

    WeatherRecord {
        date_time: timestamp,
        us_units: UnitSystem::Us,
        values,
    }
}
