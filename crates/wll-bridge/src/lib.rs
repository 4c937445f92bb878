//! WeatherLink Live acquisition bridge
//!
//! Polls a WeatherLink Live hub's local HTTP API for current conditions and
//! turns the multi-transmitter payload into one canonical weather record per
//! tick, in a single unit system, with every field present.
//!
//! # Architecture
//!
//! ```text
//! WLL /v1/current_conditions ──► HttpSource ──► Poller ──► mpsc ──► host
//!                                                 │
//!                     parse_conditions ─► select_fields ─► normalize ─► emit
//! ```
//!
//! # Modules
//!
//! - [`config`]: YAML poll configuration and validation.
//! - [`conditions`]: typed decoding of the device's condition blocks.
//! - [`error`]: recoverable and fatal failure tiers.
//! - [`fetch`]: the [`ConditionsSource`](fetch::ConditionsSource) seam and its HTTP implementation.
//! - [`mapper`]: transmitter tie-breaking and field selection.
//! - [`normalize`]: sentinel handling, rain scaling and accumulation.
//! - [`record`]: canonical schema and record assembly.
//! - [`scheduler`]: the poll loop, retries and health state machine.

pub mod conditions;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mapper;
pub mod normalize;
pub mod record;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::PollConfig;
pub use error::{AcquisitionError, ConfigError, FatalAcquisitionError, TickError};
pub use fetch::{ConditionsSource, DeviceEndpoint, HttpSource};
pub use normalize::Reading;
pub use record::{CanonicalField, UnitSystem, WeatherRecord};
pub use scheduler::{Health, Poller, TickOutcome};
