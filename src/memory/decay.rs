// src/memory/decay.rs

//! Time-based importance decay with recall reinforcement.
//!
//! The curve is an exponential half-life: a record retains exactly half of
//! its base importance `decay_days` after it was last reinforced. Purely a
//! function of elapsed time — no randomness, and recomputation from the
//! stored base is idempotent.

use chrono::{DateTime, Utc};

use crate::config::MemoryConfig;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Immutable decay parameters, snapshotted once per process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct DecayPolicy {
    pub enabled: bool,
    /// Half-life in days.
    pub half_life_days: f64,
    /// Importance at or below this counts as forgotten.
    pub forget_floor: f32,
    /// Importance assigned to newly created records.
    pub initial_importance: f32,
}

impl DecayPolicy {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            enabled: config.decay_enabled,
            half_life_days: config.decay_days as f64,
            forget_floor: config.forget_floor,
            initial_importance: config.initial_importance,
        }
    }

    /// Effective importance at `now` for a record last reinforced at
    /// `last_reinforced_at`. Monotone non-increasing in elapsed time.
    pub fn decayed_importance(
        &self,
        base_importance: f32,
        last_reinforced_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f32 {
        if !self.enabled {
            return base_importance;
        }
        let elapsed = now.signed_duration_since(last_reinforced_at);
        let age_days = elapsed.num_seconds().max(0) as f64 / SECONDS_PER_DAY;
        let retained = 0.5_f64.powf(age_days / self.half_life_days);
        (base_importance as f64 * retained) as f32
    }

    /// Records at or below the floor are excluded from recall and lazily
    /// pruned. With decay disabled nothing is ever forgotten.
    pub fn is_forgotten(&self, importance: f32) -> bool {
        self.enabled && importance <= self.forget_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy() -> DecayPolicy {
        DecayPolicy {
            enabled: true,
            half_life_days: 30.0,
            forget_floor: 0.05,
            initial_importance: 1.0,
        }
    }

    #[test]
    fn half_life_is_exact() {
        let p = policy();
        let t0 = Utc::now();
        let at_half_life = p.decayed_importance(1.0, t0, t0 + Duration::days(30));
        assert!((at_half_life - 0.5).abs() < 1e-6);
    }

    #[test]
    fn decay_is_monotone_non_increasing() {
        let p = policy();
        let t0 = Utc::now();
        let mut previous = f32::INFINITY;
        for days in [0, 1, 7, 30, 90, 365, 3650] {
            let importance = p.decayed_importance(1.0, t0, t0 + Duration::days(days));
            assert!(importance <= previous, "importance rose at day {days}");
            assert!(importance >= 0.0);
            previous = importance;
        }
    }

    #[test]
    fn disabled_policy_never_decays() {
        let p = DecayPolicy {
            enabled: false,
            ..policy()
        };
        let t0 = Utc::now();
        let importance = p.decayed_importance(0.8, t0, t0 + Duration::days(3650));
        assert_eq!(importance, 0.8);
        assert!(!p.is_forgotten(0.0));
    }

    #[test]
    fn future_reinforcement_clamps_to_base() {
        let p = policy();
        let now = Utc::now();
        // Clock skew must not inflate importance.
        let importance = p.decayed_importance(1.0, now + Duration::hours(1), now);
        assert_eq!(importance, 1.0);
    }

    #[test]
    fn floor_marks_forgotten() {
        let p = policy();
        assert!(p.is_forgotten(0.05));
        assert!(p.is_forgotten(0.01));
        assert!(!p.is_forgotten(0.06));
    }
}
