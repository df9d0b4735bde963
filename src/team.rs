use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::LogNormal;

use crate::constants::RATE_SUM_TOLERANCE;
use crate::error::{SimError, SimResult};

/// One season of aggregate statistics for a team, as supplied by the data
/// preparation step.
///
/// Completion rates arrive as percentages (e.g. 65.2); every other rate is a
/// fraction. Sack yardage fields are magnitudes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeamStats {
    pub team: String,

    #[serde(default)]
    pub games_played: Option<u32>,

    pub run_rate: f64,
    pub pass_rate: f64,

    pub pass_completion_rate: f64,
    pub pass_completion_rate_allowed: f64,

    pub yards_per_completion: f64,
    pub yards_allowed_per_completion: f64,
    pub rush_yards_per_carry: f64,
    pub rush_yards_per_carry_allowed: f64,

    pub turnover_rate: f64,
    pub forced_turnover_rate: f64,

    pub sacks_allowed_rate: f64,
    pub sacks_made_rate: f64,
    pub sack_yards_allowed: f64,
    pub sack_yards_inflicted: f64,

    pub field_goal_success_rate: f64,

    pub off_pass_yards_mean: f64,
    pub off_pass_yards_var: f64,
    pub def_pass_yards_mean: f64,
    pub def_pass_yards_var: f64,
    pub off_rush_yards_mean: f64,
    pub off_rush_yards_var: f64,
    pub def_rush_yards_mean: f64,
    pub def_rush_yards_var: f64,
    pub off_air_yards_mean: f64,
    pub off_air_yards_var: f64,
    pub def_air_yards_mean: f64,
    pub def_air_yards_var: f64,

    pub off_yac_per_completion: f64,
    pub def_yac_per_completion: f64,
}

impl TeamStats {
    /// Every numeric statistic paired with its field name.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 29] {
        [
            ("run_rate", self.run_rate),
            ("pass_rate", self.pass_rate),
            ("pass_completion_rate", self.pass_completion_rate),
            ("pass_completion_rate_allowed", self.pass_completion_rate_allowed),
            ("yards_per_completion", self.yards_per_completion),
            ("yards_allowed_per_completion", self.yards_allowed_per_completion),
            ("rush_yards_per_carry", self.rush_yards_per_carry),
            ("rush_yards_per_carry_allowed", self.rush_yards_per_carry_allowed),
            ("turnover_rate", self.turnover_rate),
            ("forced_turnover_rate", self.forced_turnover_rate),
            ("sacks_allowed_rate", self.sacks_allowed_rate),
            ("sacks_made_rate", self.sacks_made_rate),
            ("sack_yards_allowed", self.sack_yards_allowed),
            ("sack_yards_inflicted", self.sack_yards_inflicted),
            ("field_goal_success_rate", self.field_goal_success_rate),
            ("off_pass_yards_mean", self.off_pass_yards_mean),
            ("off_pass_yards_var", self.off_pass_yards_var),
            ("def_pass_yards_mean", self.def_pass_yards_mean),
            ("def_pass_yards_var", self.def_pass_yards_var),
            ("off_rush_yards_mean", self.off_rush_yards_mean),
            ("off_rush_yards_var", self.off_rush_yards_var),
            ("def_rush_yards_mean", self.def_rush_yards_mean),
            ("def_rush_yards_var", self.def_rush_yards_var),
            ("off_air_yards_mean", self.off_air_yards_mean),
            ("off_air_yards_var", self.off_air_yards_var),
            ("def_air_yards_mean", self.def_air_yards_mean),
            ("def_air_yards_var", self.def_air_yards_var),
            ("off_yac_per_completion", self.off_yac_per_completion),
            ("def_yac_per_completion", self.def_yac_per_completion),
        ]
    }

    fn rates(&self) -> [(&'static str, f64); 9] {
        [
            ("run_rate", self.run_rate),
            ("pass_rate", self.pass_rate),
            ("pass_completion_rate", self.pass_completion_rate),
            ("pass_completion_rate_allowed", self.pass_completion_rate_allowed),
            ("turnover_rate", self.turnover_rate),
            ("forced_turnover_rate", self.forced_turnover_rate),
            ("sacks_allowed_rate", self.sacks_allowed_rate),
            ("sacks_made_rate", self.sacks_made_rate),
            ("field_goal_success_rate", self.field_goal_success_rate),
        ]
    }

    fn per_play_yards(&self) -> [(&'static str, f64); 8] {
        [
            ("yards_per_completion", self.yards_per_completion),
            ("yards_allowed_per_completion", self.yards_allowed_per_completion),
            ("rush_yards_per_carry", self.rush_yards_per_carry),
            ("rush_yards_per_carry_allowed", self.rush_yards_per_carry_allowed),
            ("sack_yards_allowed", self.sack_yards_allowed),
            ("sack_yards_inflicted", self.sack_yards_inflicted),
            ("off_yac_per_completion", self.off_yac_per_completion),
            ("def_yac_per_completion", self.def_yac_per_completion),
        ]
    }
}

/// Log-normal parameters `(mu, sigma)` matching a target mean and variance
/// by method of moments.
pub fn lognormal_params(mean: f64, variance: f64) -> (f64, f64) {
    let sigma = (1.0 + variance / (mean * mean)).ln().sqrt();
    let mu = mean.ln() - sigma * sigma / 2.0;
    (mu, sigma)
}

#[derive(Clone, Debug)]
enum Fit {
    LogNormal(LogNormal),
    /// Zero variance collapses the fit onto its mean
    Constant(f64),
}

/// Per-play yardage distribution fitted once from a mean and variance.
#[derive(Clone, Debug)]
pub struct YardageDistribution {
    fit: Fit,
}

impl YardageDistribution {
    pub fn fit(team: &str, name: &str, mean: f64, variance: f64) -> SimResult<Self> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(SimError::invalid_stats(
                team,
                format!("{name} mean must be positive, got {mean}"),
            ));
        }
        if !variance.is_finite() || variance < 0.0 {
            return Err(SimError::invalid_stats(
                team,
                format!("{name} variance must be non-negative, got {variance}"),
            ));
        }

        let fit = if variance == 0.0 {
            Fit::Constant(mean)
        } else {
            let (mu, sigma) = lognormal_params(mean, variance);
            let dist = LogNormal::new(mu, sigma)
                .map_err(|e| SimError::invalid_stats(team, format!("{name}: {e}")))?;
            Fit::LogNormal(dist)
        };

        Ok(YardageDistribution { fit })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fit {
            Fit::LogNormal(dist) => dist.sample(rng),
            Fit::Constant(value) => *value,
        }
    }
}

/// Validated team statistics with fitted yardage distributions.
///
/// Immutable once built; share it between simulations behind an `Arc`.
#[derive(Clone, Debug)]
pub struct TeamProfile {
    stats: TeamStats,
    off_passing: YardageDistribution,
    def_passing: YardageDistribution,
    off_rushing: YardageDistribution,
    def_rushing: YardageDistribution,
    off_air: YardageDistribution,
    def_air: YardageDistribution,
}

impl TeamProfile {
    /// Validate and normalize a statistics record, fitting all distributions.
    pub fn new(mut stats: TeamStats) -> SimResult<Self> {
        let team = stats.team.clone();
        if team.trim().is_empty() {
            return Err(SimError::invalid_stats("<unnamed>", "team code is empty"));
        }

        for (name, value) in stats.numeric_fields() {
            if !value.is_finite() {
                return Err(SimError::invalid_stats(&team, format!("{name} is not finite")));
            }
        }

        // Completion rates are stored as percentages
        stats.pass_completion_rate /= 100.0;
        stats.pass_completion_rate_allowed /= 100.0;

        for (name, value) in stats.rates() {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::invalid_stats(
                    &team,
                    format!("{name} must lie in [0, 1], got {value}"),
                ));
            }
        }

        for (name, value) in stats.per_play_yards() {
            if value < 0.0 {
                return Err(SimError::invalid_stats(
                    &team,
                    format!("{name} must be non-negative, got {value}"),
                ));
            }
        }

        let rate_sum = stats.run_rate + stats.pass_rate;
        if (rate_sum - 1.0).abs() > RATE_SUM_TOLERANCE {
            return Err(SimError::invalid_stats(
                &team,
                format!("run_rate + pass_rate must be 1, got {rate_sum}"),
            ));
        }
        stats.pass_rate = 1.0 - stats.run_rate;

        Ok(TeamProfile {
            off_passing: YardageDistribution::fit(
                &team,
                "off_pass_yards",
                stats.off_pass_yards_mean,
                stats.off_pass_yards_var,
            )?,
            def_passing: YardageDistribution::fit(
                &team,
                "def_pass_yards",
                stats.def_pass_yards_mean,
                stats.def_pass_yards_var,
            )?,
            off_rushing: YardageDistribution::fit(
                &team,
                "off_rush_yards",
                stats.off_rush_yards_mean,
                stats.off_rush_yards_var,
            )?,
            def_rushing: YardageDistribution::fit(
                &team,
                "def_rush_yards",
                stats.def_rush_yards_mean,
                stats.def_rush_yards_var,
            )?,
            off_air: YardageDistribution::fit(
                &team,
                "off_air_yards",
                stats.off_air_yards_mean,
                stats.off_air_yards_var,
            )?,
            def_air: YardageDistribution::fit(
                &team,
                "def_air_yards",
                stats.def_air_yards_mean,
                stats.def_air_yards_var,
            )?,
            stats,
        })
    }

    /// Parse a single JSON record. Missing fields are reported as invalid
    /// statistics.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let stats: TeamStats = serde_json::from_str(json)
            .map_err(|e| SimError::invalid_stats("<unparsed>", e.to_string()))?;
        TeamProfile::new(stats)
    }

    pub fn name(&self) -> &str {
        &self.stats.team
    }

    /// Normalized statistics.
    pub fn stats(&self) -> &TeamStats {
        &self.stats
    }

    /// Look up a normalized statistic by its record field name.
    pub fn stat(&self, key: &str) -> Option<f64> {
        if key == "games_played" {
            return self.stats.games_played.map(f64::from);
        }
        self.stats
            .numeric_fields()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|&(_, value)| value)
    }

    pub fn sample_offensive_passing_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.off_passing.sample(rng)
    }

    pub fn sample_offensive_rushing_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.off_rushing.sample(rng)
    }

    pub fn sample_defensive_passing_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.def_passing.sample(rng)
    }

    pub fn sample_defensive_rushing_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.def_rushing.sample(rng)
    }

    pub fn sample_offensive_air_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.off_air.sample(rng)
    }

    pub fn sample_defensive_air_yards<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.def_air.sample(rng)
    }
}

/// League-average statistics shared by the unit tests.
#[cfg(test)]
pub(crate) fn sample_stats(team: &str) -> TeamStats {
    TeamStats {
        team: team.to_string(),
        games_played: Some(17),
        run_rate: 0.43,
        pass_rate: 0.57,
        pass_completion_rate: 65.0,
        pass_completion_rate_allowed: 65.0,
        yards_per_completion: 11.0,
        yards_allowed_per_completion: 11.0,
        rush_yards_per_carry: 4.3,
        rush_yards_per_carry_allowed: 4.3,
        turnover_rate: 0.025,
        forced_turnover_rate: 0.025,
        sacks_allowed_rate: 0.065,
        sacks_made_rate: 0.065,
        sack_yards_allowed: 6.5,
        sack_yards_inflicted: 6.5,
        field_goal_success_rate: 0.85,
        off_pass_yards_mean: 10.5,
        off_pass_yards_var: 90.0,
        def_pass_yards_mean: 10.5,
        def_pass_yards_var: 90.0,
        off_rush_yards_mean: 4.3,
        off_rush_yards_var: 35.0,
        def_rush_yards_mean: 4.3,
        def_rush_yards_var: 35.0,
        off_air_yards_mean: 6.0,
        off_air_yards_var: 50.0,
        def_air_yards_mean: 6.0,
        def_air_yards_var: 50.0,
        off_yac_per_completion: 5.0,
        def_yac_per_completion: 5.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_new_normalizes_completion_rates() {
        let profile = TeamProfile::new(sample_stats("BUF")).unwrap();
        assert!((profile.stats().pass_completion_rate - 0.65).abs() < 1e-12);
        assert!((profile.stats().pass_completion_rate_allowed - 0.65).abs() < 1e-12);
        assert_eq!(profile.name(), "BUF");
    }

    #[test]
    fn test_rates_sum_to_one() {
        let mut stats = sample_stats("KC");
        stats.run_rate = 0.4004;
        stats.pass_rate = 0.5999;
        let profile = TeamProfile::new(stats).unwrap();
        let s = profile.stats();
        assert!((s.run_rate + s.pass_rate - 1.0).abs() < 1e-12);
        for (name, value) in s.rates() {
            assert!((0.0..=1.0).contains(&value), "{name} out of range");
        }
    }

    #[test]
    fn test_rate_sum_mismatch_rejected() {
        let mut stats = sample_stats("KC");
        stats.run_rate = 0.5;
        stats.pass_rate = 0.4;
        assert!(matches!(
            TeamProfile::new(stats),
            Err(SimError::InvalidStatistics { .. })
        ));
    }

    #[test]
    fn test_rate_out_of_range_rejected() {
        let mut stats = sample_stats("KC");
        stats.field_goal_success_rate = 85.0;
        assert!(matches!(
            TeamProfile::new(stats),
            Err(SimError::InvalidStatistics { .. })
        ));
    }

    #[test]
    fn test_non_positive_mean_rejected() {
        let mut stats = sample_stats("DET");
        stats.off_rush_yards_mean = 0.0;
        let err = TeamProfile::new(stats).unwrap_err();
        assert!(err.to_string().contains("off_rush_yards"));
    }

    #[test]
    fn test_nan_rejected() {
        let mut stats = sample_stats("DET");
        stats.sacks_made_rate = f64::NAN;
        assert!(TeamProfile::new(stats).is_err());
    }

    #[test]
    fn test_missing_field_is_invalid_statistics() {
        let mut value = serde_json::to_value(sample_stats("PHI")).unwrap();
        value.as_object_mut().unwrap().remove("turnover_rate");
        let err = TeamProfile::from_json(&value.to_string()).unwrap_err();
        match err {
            SimError::InvalidStatistics { reason, .. } => assert!(reason.contains("turnover_rate")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_json_round_trip() {
        let json = serde_json::to_string(&sample_stats("PHI")).unwrap();
        let profile = TeamProfile::from_json(&json).unwrap();
        assert_eq!(profile.name(), "PHI");
    }

    #[test]
    fn test_stat_lookup() {
        let profile = TeamProfile::new(sample_stats("SF")).unwrap();
        assert_eq!(profile.stat("rush_yards_per_carry"), Some(4.3));
        assert_eq!(profile.stat("pass_completion_rate"), Some(0.65));
        assert_eq!(profile.stat("no_such_stat"), None);
    }

    #[test]
    fn test_zero_variance_is_constant() {
        let mut stats = sample_stats("SF");
        stats.off_rush_yards_var = 0.0;
        let profile = TeamProfile::new(stats).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(profile.sample_offensive_rushing_yards(&mut rng), 4.3);
        }
    }

    #[test]
    fn test_sampling_deterministic_under_seed() {
        let profile = TeamProfile::new(sample_stats("SF")).unwrap();
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(
                profile.sample_defensive_air_yards(&mut rng1),
                profile.sample_defensive_air_yards(&mut rng2)
            );
        }
    }

    #[test]
    fn test_sample_mean_matches_target() {
        let profile = TeamProfile::new(sample_stats("SF")).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let n = 200_000;
        let total: f64 = (0..n)
            .map(|_| profile.sample_offensive_rushing_yards(&mut rng))
            .sum();
        let mean = total / n as f64;
        assert!((mean - 4.3).abs() < 0.1, "sample mean {mean} far from 4.3");
    }

    proptest! {
        #[test]
        fn prop_lognormal_moments_recovered(mean in 0.5f64..40.0, variance in 0.01f64..400.0) {
            let (mu, sigma) = lognormal_params(mean, variance);
            prop_assert!(sigma > 0.0);
            let fitted_mean = (mu + sigma * sigma / 2.0).exp();
            let fitted_var = ((sigma * sigma).exp() - 1.0) * (2.0 * mu + sigma * sigma).exp();
            prop_assert!((fitted_mean - mean).abs() < 1e-9 * mean.max(1.0));
            prop_assert!((fitted_var - variance).abs() < 1e-6 * variance.max(1.0));
        }

        #[test]
        fn prop_samples_positive(seed in any::<u64>()) {
            let profile = TeamProfile::new(sample_stats("SF")).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            prop_assert!(profile.sample_offensive_passing_yards(&mut rng) > 0.0);
            prop_assert!(profile.sample_offensive_air_yards(&mut rng) > 0.0);
        }
    }
}
