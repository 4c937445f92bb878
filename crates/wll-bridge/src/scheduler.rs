//! Poll loop: fetch, retry, normalize, emit.
//!
//! # Tick pipeline
//!
//! ```text
//! interval tick ──► fetch (+ retries) ──► parse_conditions ──► select_fields
//!                                                                  │
//!   host channel ◄── WeatherRecord ◄── emit ◄── normalize + rain ◄─┘
//! ```
//!
//! Failures are tick-scoped. [`HealthTracker`] counts failed ticks in a row
//! and escalates to [`FatalAcquisitionError`] once the configured limit is
//! exceeded; the host decides whether that ends the process.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::conditions::parse_conditions;
use crate::config::PollConfig;
use crate::error::{AcquisitionError, FatalAcquisitionError, TickError};
use crate::fetch::ConditionsSource;
use crate::mapper::{select_fields, BindingHints, TransmitterBinding};
use crate::normalize::RainAccumulator;
use crate::record::{emit, CanonicalField, WeatherRecord};

/// Outcome of one tick, as delivered to the host.
pub type TickOutcome = Result<WeatherRecord, TickError>;

// ── Health state machine ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    #[default]
    Healthy,
    Degraded {
        consecutive_failures: u32,
    },
    /// A fatal error was just surfaced. The next failure starts a new count.
    Fatal {
        consecutive_failures: u32,
    },
}

/// Tracks consecutive failed ticks and decides the failure tier.
#[derive(Debug)]
pub struct HealthTracker {
    max_consecutive_failures: u32,
    tolerate_startup_failure: bool,
    state: Health,
    ticks: u64,
}

impl HealthTracker {
    pub fn new(max_consecutive_failures: u32, tolerate_startup_failure: bool) -> Self {
        Self {
            max_consecutive_failures,
            tolerate_startup_failure,
            state: Health::Healthy,
            ticks: 0,
        }
    }

    pub fn state(&self) -> Health {
        self.state
    }

    /// Record a good tick. Returns the failure streak that just ended, if any.
    pub fn on_success(&mut self) -> Option<u32> {
        self.ticks += 1;
        let ended = match self.state {
            Health::Healthy => None,
            Health::Degraded {
                consecutive_failures,
            }
            | Health::Fatal {
                consecutive_failures,
            } => Some(consecutive_failures),
        };
        self.state = Health::Healthy;
        ended
    }

    /// Record a failed tick and classify it.
    pub fn on_failure(&mut self, err: AcquisitionError) -> TickError {
        let first_tick = self.ticks == 0;
        self.ticks += 1;

        if first_tick && !self.tolerate_startup_failure && err.is_connectivity() {
            self.state = Health::Fatal {
                consecutive_failures: 1,
            };
            return FatalAcquisitionError::Startup(err).into();
        }

        let failures = match self.state {
            Health::Degraded {
                consecutive_failures,
            } => consecutive_failures + 1,
            Health::Healthy | Health::Fatal { .. } => 1,
        };

        if failures > self.max_consecutive_failures {
            self.state = Health::Fatal {
                consecutive_failures: failures,
            };
            return FatalAcquisitionError::ThresholdExceeded {
                failures,
                limit: self.max_consecutive_failures,
                last: err,
            }
            .into();
        }

        self.state = Health::Degraded {
            consecutive_failures: failures,
        };
        err.into()
    }
}

// ── Poller ──────────────────────────────────────────────────────────

/// Owns everything that lives across ticks: health, rain baseline and the
/// last transmitter binding. Only one fetch is ever in flight.
pub struct Poller<S> {
    source: S,
    hints: BindingHints,
    interval: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    health: HealthTracker,
    rain: RainAccumulator,
    binding: Option<TransmitterBinding>,
}

impl<S: ConditionsSource> Poller<S> {
    pub fn new(source: S, config: &PollConfig) -> Self {
        Self {
            source,
            hints: config.transmitters.clone(),
            interval: config.poll_interval(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
            health: HealthTracker::new(
                config.max_consecutive_failures,
                config.tolerate_startup_failure,
            ),
            rain: RainAccumulator::new(),
            binding: None,
        }
    }

    /// Override the tick interval from the config.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn health(&self) -> Health {
        self.health.state()
    }

    /// Fetch once, retrying up to `retry_attempts` times on failure.
    pub async fn poll_once(&self) -> Result<Value, AcquisitionError> {
        let mut attempt = 0;
        loop {
            match self.source.fetch().await {
                Ok(payload) => return Ok(payload),
                Err(e) if attempt < self.retry_attempts => {
                    attempt += 1;
                    log::debug!(
                        "Fetch failed ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retry_attempts
                    );
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one tick. `now` (Unix seconds) stamps the record when the
    /// device omits its own timestamp.
    pub async fn tick(&mut self, now: i64) -> TickOutcome {
        let result = match self.poll_once().await {
            Ok(payload) => self.process(&payload, now),
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                if let Some(failures) = self.health.on_success() {
                    log::info!("Device recovered after {} failed poll(s)", failures);
                }
                Ok(record)
            }
            Err(e) => Err(self.health.on_failure(e)),
        }
    }

    fn process(&mut self, payload: &Value, now: i64) -> Result<WeatherRecord, AcquisitionError> {
        let conditions = parse_conditions(payload)?;
        let selection = select_fields(&conditions.blocks, &self.hints)?;

        let binding = selection.binding();
        if self.binding.as_ref() != Some(&binding) {
            log::info!("Transmitter binding: {}", binding);
            self.binding = Some(binding);
        }

        let mut readings = selection.readings();
        readings.insert(
            CanonicalField::Rain,
            self.rain.update(selection.storm.as_ref()),
        );

        Ok(emit(&readings, conditions.timestamp.unwrap_or(now)))
    }

    /// Poll on a fixed interval, sending every tick outcome to `records`.
    ///
    /// Stops when `shutdown` fires (checked between ticks) or when the
    /// receiving side of `records` is dropped. After a tick overruns the
    /// interval, one overdue tick runs immediately and the rest are dropped;
    /// ticks never overlap.
    pub async fn run(
        mut self,
        records: mpsc::Sender<TickOutcome>,
        mut shutdown: watch::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let outcome = tokio::select! {
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received, stopping poll loop");
                    break;
                }
                _ = ticker.tick() => self.logged_tick().await,
            };

            // A stalled consumer must not block shutdown.
            tokio::select! {
                sent = records.send(outcome) => {
                    if sent.is_err() {
                        log::info!("Record consumer closed, stopping poll loop");
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received, stopping poll loop");
                    break;
                }
            }
        }
    }

    async fn logged_tick(&mut self) -> TickOutcome {
        let now = chrono::Utc::now();
        let outcome = self.tick(now.timestamp()).await;
        match &outcome {
            Ok(record) => log::debug!(
                "Poll at {}: {} field(s) reported",
                now.to_rfc3339(),
                record.reported()
            ),
            Err(TickError::Recoverable(e)) => {
                log::warn!("Poll at {} failed: {}", now.to_rfc3339(), e)
            }
            Err(TickError::Fatal(e)) => {
                log::error!("Poll at {} failed fatally: {}", now.to_rfc3339(), e)
            }
        }
        outcome
    }
}
