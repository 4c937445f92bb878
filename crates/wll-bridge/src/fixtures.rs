//! Device payloads shared by unit tests.

use serde_json::{json, Value};

/// Response captured from a WLL with an ISS, a leaf/soil station and
/// the built-in barometer and inside sensors.
pub fn sample_payload() -> Value {
    json!({
        "data": {
            "did": "001D0A700002",
            "ts": 1531754005,
            "conditions": [
                {
                    "lsid": 48308,
                    "data_structure_type": 1,
                    "txid": 1,
                    "temp": 62.7,
                    "hum": 1.1,
                    "dew_point": -0.3,
                    "wet_bulb": null,
                    "heat_index": 5.5,
                    "wind_chill": 6.0,
                    "thw_index": 5.5,
                    "thsw_index": 5.5,
                    "wind_speed_last": 2,
                    "wind_dir_last": null,
                    "wind_speed_avg_last_1_min": 4,
                    "wind_dir_scalar_avg_last_1_min": 15,
                    "wind_speed_hi_last_10_min": 8,
                    "wind_dir_scalar_avg_last_10_min": 170,
                    "rain_size": 2,
                    "rain_rate_last": 0,
                    "rain_rate_hi": null,
                    "rainfall_last_15_min": null,
                    "rainfall_daily": 63,
                    "rain_storm": 113,
                    "rain_storm_start_at": 1489494900,
                    "solar_rad": 747,
                    "uv_index": 5.5,
                    "rx_state": 2,
                    "trans_battery_flag": 0
                },
                {
                    "lsid": 3187671188u32,
                    "data_structure_type": 2,
                    "txid": 3,
                    "temp_1": null,
                    "temp_2": 73.0,
                    "temp_3": null,
                    "temp_4": null,
                    "moist_soil_1": 1.0,
                    "moist_soil_2": 5.0,
                    "moist_soil_3": null,
                    "moist_soil_4": null,
                    "wet_leaf_1": null,
                    "wet_leaf_2": 0.0,
                    "rx_state": null,
                    "trans_battery_flag": null
                },
                {
                    "lsid": 48307,
                    "data_structure_type": 3,
                    "bar_sea_level": 30.008,
                    "bar_trend": null,
                    "bar_absolute": 30.008
                },
                {
                    "lsid": 48306,
                    "data_structure_type": 4,
                    "temp_in": 78.0,
                    "hum_in": 41.1,
                    "dew_point_in": 7.8,
                    "heat_index_in": 8.4
                }
            ]
        },
        "error": null
    })
}
