//! Participant traits and the per-lap performance model.

use crate::config::RaceConfig;
use crate::equipment::EquipmentClass;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Fixed traits drawn once when a participant is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTraits {
    pub skill: f64,
    pub aggression: f64,
    pub consistency: f64,
}

impl PerformanceTraits {
    /// Draws each trait uniformly from its configured range.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, config: &RaceConfig) -> Self {
        Self {
            skill: uniform(rng, config.skill_range),
            aggression: uniform(rng, config.aggression_range),
            consistency: uniform(rng, config.consistency_range),
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if lo >= hi {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Lap time and wear model.
///
/// ```text
/// lap  = base / speed + wear * wear_penalty + (2 - skill) * skill_penalty + N(0, (1 - consistency) * noise_scale)
/// lap  = max(lap, min_lap_time)
/// wear = min(wear + wear_rate * (1 + aggression * aggression_wear_factor), 1)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LapModel {
    base_lap_time: f64,
    min_lap_time: f64,
    wear_penalty: f64,
    skill_penalty: f64,
    noise_scale: f64,
    aggression_wear_factor: f64,
}

impl LapModel {
    pub fn from_config(config: &RaceConfig) -> Self {
        Self {
            base_lap_time: config.base_lap_time,
            min_lap_time: config.min_lap_time,
            wear_penalty: config.wear_penalty,
            skill_penalty: config.skill_penalty,
            noise_scale: config.noise_scale,
            aggression_wear_factor: config.aggression_wear_factor,
        }
    }

    /// Deterministic part of the lap time plus a given noise sample, floored.
    pub fn lap_duration(
        &self,
        equipment: EquipmentClass,
        wear: f64,
        traits: &PerformanceTraits,
        noise: f64,
    ) -> f64 {
        let profile = equipment.profile();
        let raw = self.base_lap_time / profile.speed_multiplier
            + wear * self.wear_penalty
            + (2.0 - traits.skill) * self.skill_penalty
            + noise;

        // NaN from a degenerate noise sample falls back to the floor as well
        if raw.is_nan() {
            return self.min_lap_time;
        }
        raw.max(self.min_lap_time)
    }

    /// Draws consistency noise. Perfectly consistent participants get 0.
    pub fn sample_noise<R: Rng + ?Sized>(&self, rng: &mut R, traits: &PerformanceTraits) -> f64 {
        let std_dev = (1.0 - traits.consistency) * self.noise_scale;
        if std_dev <= 0.0 {
            return 0.0;
        }
        Normal::new(0.0, std_dev)
            .map(|normal| normal.sample(rng))
            .unwrap_or(0.0)
    }

    /// Simulates a full lap: draws noise and returns the floored duration.
    pub fn simulate_lap<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        equipment: EquipmentClass,
        wear: f64,
        traits: &PerformanceTraits,
    ) -> f64 {
        let noise = self.sample_noise(rng, traits);
        self.lap_duration(equipment, wear, traits, noise)
    }

    /// Wear after one more lap, capped at 1.0.
    pub fn next_wear(&self, equipment: EquipmentClass, wear: f64, traits: &PerformanceTraits) -> f64 {
        let added = equipment.profile().wear_rate * (1.0 + traits.aggression * self.aggression_wear_factor);
        (wear + added).min(1.0)
    }
}
