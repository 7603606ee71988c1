//! Race configuration.
//!
//! All protocol timings are expressed in abstract time units and converted
//! to wall-clock durations through `time_unit`, so the same race can run at
//! human pace from the CLI or compressed in tests.

use crate::error::ConfigError;
use std::time::Duration;

/// Waits and pacing delays, in time units.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceTimings {
    /// Participant: how long to wait for the team's strategy
    pub strategy_wait: f64,

    /// Participant: how long to wait for a rank reply after each report
    pub rank_reply_wait: f64,

    /// Coordinator/Team: generic receive poll
    pub receive_poll: f64,

    /// Team: delay before dispatching strategy so participants are reachable
    pub settle_delay: f64,

    /// Team: pause between successive strategy sends
    pub dispatch_pacing: f64,

    /// Participant: cooperative pause between laps
    pub lap_pacing: f64,
}

impl Default for RaceTimings {
    fn default() -> Self {
        Self {
            strategy_wait: 15.0,
            rank_reply_wait: 0.5,
            receive_poll: 1.0,
            settle_delay: 5.0,
            dispatch_pacing: 0.2,
            lap_pacing: 0.1,
        }
    }
}

/// Configuration for a race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceConfig {
    /// Master seed for determinism (0 = OS entropy)
    pub seed: u64,

    /// Number of participants (also the completion target)
    pub num_participants: u32,

    /// Laps each participant must complete
    pub num_laps: u32,

    /// Participants per team
    pub team_size: u32,

    /// Lap time before equipment, wear, skill and noise adjustments
    pub base_lap_time: f64,

    /// Floor applied to every simulated lap
    pub min_lap_time: f64,

    /// Seconds added per unit of wear
    pub wear_penalty: f64,

    /// Multiplier on `(2 - skill)`
    pub skill_penalty: f64,

    /// Multiplier on `(1 - consistency)` giving the noise standard deviation
    pub noise_scale: f64,

    /// How much aggression amplifies per-lap wear
    pub aggression_wear_factor: f64,

    pub skill_range: (f64, f64),
    pub aggression_range: (f64, f64),
    pub consistency_range: (f64, f64),

    /// Participants send telemetry every N laps
    pub telemetry_interval: u32,

    /// Teams raise an alert above this wear
    pub wear_alert_threshold: f64,

    /// Wall-clock length of one time unit
    pub time_unit: Duration,

    pub timings: RaceTimings,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_participants: 8,
            num_laps: 20,
            team_size: 2,
            base_lap_time: 90.0,
            min_lap_time: 80.0,
            wear_penalty: 5.0,
            skill_penalty: 2.0,
            noise_scale: 2.0,
            aggression_wear_factor: 0.5,
            skill_range: (0.85, 1.0),
            aggression_range: (0.3, 0.9),
            consistency_range: (0.7, 0.95),
            telemetry_interval: 5,
            wear_alert_threshold: 0.7,
            time_unit: Duration::from_secs(1),
            timings: RaceTimings::default(),
        }
    }
}

impl RaceConfig {
    pub const MAX_PARTICIPANTS: u32 = 64;
    pub const MAX_LAPS: u32 = 200;
    pub const MAX_TIME_UNIT: Duration = Duration::from_secs(3600);
    pub const MAX_WAIT: Duration = Duration::from_secs(24 * 3600);

    /// Converts a value in time units to a wall-clock duration.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn duration(&self, units: f64) -> Duration {
        Duration::try_from_secs_f64(self.time_unit.as_secs_f64() * units.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Number of teams needed to seat every participant.
    pub fn num_teams(&self) -> u32 {
        self.num_participants.div_ceil(self.team_size.max(1))
    }

    /// Team that owns a participant.
    pub fn team_of(&self, participant_id: u32) -> u32 {
        participant_id / self.team_size.max(1)
    }

    /// Participants belonging to a team.
    pub fn roster(&self, team_id: u32) -> Vec<u32> {
        let first = team_id.saturating_mul(self.team_size);
        (first..first.saturating_add(self.team_size))
            .filter(|id| *id < self.num_participants)
            .collect()
    }

    /// Checks every bound the agents rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("num_participants", self.num_participants, Self::MAX_PARTICIPANTS)?;
        check_count("num_laps", self.num_laps, Self::MAX_LAPS)?;
        check_count("team_size", self.team_size, Self::MAX_PARTICIPANTS)?;
        check_count("telemetry_interval", self.telemetry_interval, Self::MAX_LAPS)?;

        check_positive("base_lap_time", self.base_lap_time)?;
        check_positive("min_lap_time", self.min_lap_time)?;
        check_non_negative("wear_penalty", self.wear_penalty)?;
        check_non_negative("skill_penalty", self.skill_penalty)?;
        check_non_negative("noise_scale", self.noise_scale)?;
        check_non_negative("aggression_wear_factor", self.aggression_wear_factor)?;

        check_range("skill_range", self.skill_range)?;
        check_range("aggression_range", self.aggression_range)?;
        check_range("consistency_range", self.consistency_range)?;

        if !(self.wear_alert_threshold > 0.0 && self.wear_alert_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.wear_alert_threshold));
        }

        check_positive("time_unit", self.time_unit.as_secs_f64())?;
        check_at_most("time_unit", self.time_unit, Self::MAX_TIME_UNIT)?;

        let t = &self.timings;
        check_positive("strategy_wait", t.strategy_wait)?;
        check_positive("rank_reply_wait", t.rank_reply_wait)?;
        check_positive("receive_poll", t.receive_poll)?;
        check_non_negative("settle_delay", t.settle_delay)?;
        check_non_negative("dispatch_pacing", t.dispatch_pacing)?;
        check_non_negative("lap_pacing", t.lap_pacing)?;

        for (field, units) in [
            ("strategy_wait", t.strategy_wait),
            ("rank_reply_wait", t.rank_reply_wait),
            ("receive_poll", t.receive_poll),
            ("settle_delay", t.settle_delay),
            ("dispatch_pacing", t.dispatch_pacing),
            ("lap_pacing", t.lap_pacing),
        ] {
            check_at_most(field, self.duration(units), Self::MAX_WAIT)?;
        }

        Ok(())
    }
}

fn check_count(field: &'static str, value: u32, max: u32) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::OutOfBounds {
            field,
            min: 1,
            max: max as u64,
            value: value as u64,
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn check_at_most(field: &'static str, value: Duration, max: Duration) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::TooLong { field, value, max });
    }
    Ok(())
}

fn check_range(field: &'static str, (lo, hi): (f64, f64)) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
        return Err(ConfigError::InvalidRange { field, lo, hi });
    }
    Ok(())
}
