//! Play resolution.
//!
//! Every variant runs the same pipeline: fourth-down branch, play-type
//! selection, blended yardage, then the completion, turnover and sack gates in
//! that order. Later gates overwrite the yardage of earlier ones. Variants
//! only differ in the numbers and sources held by `StrategyConfig`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::constants::PUNT_YARDLINE_THRESHOLD;
use crate::decision::{FieldPositionHeuristic, FourthDownCall, FourthDownDecider, FourthDownFeatures};
use crate::error::{SimError, SimResult};
use crate::play::{PlayOutcome, PlayType};
use crate::state::{GameState, Matchup};
use crate::team::TeamProfile;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Baseline,
    RateBased,
    DistributionBased,
    EnhancedPassing,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 4] {
        [
            StrategyKind::Baseline,
            StrategyKind::RateBased,
            StrategyKind::DistributionBased,
            StrategyKind::EnhancedPassing,
        ]
    }

    /// Short model code used by the serving layer.
    pub fn code(self) -> &'static str {
        match self {
            StrategyKind::Baseline => "proto",
            StrategyKind::RateBased => "v1",
            StrategyKind::DistributionBased => "v1a",
            StrategyKind::EnhancedPassing => "v1b",
        }
    }

    /// Accepts either the model code or the snake-case variant name.
    pub fn from_code(code: &str) -> SimResult<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "proto" | "baseline" => Ok(StrategyKind::Baseline),
            "v1" | "rate_based" => Ok(StrategyKind::RateBased),
            "v1a" | "distribution_based" => Ok(StrategyKind::DistributionBased),
            "v1b" | "enhanced_passing" => Ok(StrategyKind::EnhancedPassing),
            _ => Err(SimError::UnknownStrategy(code.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FourthDownSource {
    Heuristic,
    DecisionFunction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YardageSource {
    /// Season per-play averages
    SeasonAverages,
    /// Fresh draws from the fitted log-normal distributions
    Distributions,
    /// Distributions for runs; air yards plus yards after catch for passes
    AirYardsPlusYac,
}

/// Inclusive integer range sampled uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformRange {
    pub min: u32,
    pub max: u32,
}

impl UniformRange {
    pub const fn new(min: u32, max: u32) -> Self {
        UniformRange { min, max }
    }

    pub const fn fixed(value: u32) -> Self {
        UniformRange { min: value, max: value }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Weight of the offense side in every blend; the defense gets the rest
    pub offense_weight: f64,
    pub fourth_down: FourthDownSource,
    pub yardage: YardageSource,
    /// Multiplier applied to the blended turnover rate
    pub turnover_dampening: f64,
    /// Seconds consumed per play
    pub play_clock: UniformRange,
    pub punt_yards: UniformRange,
    #[serde(default = "default_punt_threshold")]
    pub punt_threshold: f64,
}

fn default_punt_threshold() -> f64 {
    PUNT_YARDLINE_THRESHOLD
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::baseline()
    }
}

impl StrategyConfig {
    pub fn baseline() -> Self {
        StrategyConfig {
            kind: StrategyKind::Baseline,
            offense_weight: 0.55,
            fourth_down: FourthDownSource::Heuristic,
            yardage: YardageSource::SeasonAverages,
            turnover_dampening: 1.0,
            play_clock: UniformRange::new(15, 40),
            punt_yards: UniformRange::fixed(40),
            punt_threshold: PUNT_YARDLINE_THRESHOLD,
        }
    }

    pub fn rate_based() -> Self {
        StrategyConfig {
            kind: StrategyKind::RateBased,
            offense_weight: 0.65,
            fourth_down: FourthDownSource::DecisionFunction,
            yardage: YardageSource::SeasonAverages,
            turnover_dampening: 0.45,
            play_clock: UniformRange::new(15, 40),
            punt_yards: UniformRange::fixed(40),
            punt_threshold: PUNT_YARDLINE_THRESHOLD,
        }
    }

    pub fn distribution_based() -> Self {
        StrategyConfig {
            kind: StrategyKind::DistributionBased,
            offense_weight: 0.625,
            fourth_down: FourthDownSource::DecisionFunction,
            yardage: YardageSource::Distributions,
            turnover_dampening: 0.40,
            play_clock: UniformRange::new(20, 30),
            punt_yards: UniformRange::new(40, 55),
            punt_threshold: PUNT_YARDLINE_THRESHOLD,
        }
    }

    pub fn enhanced_passing() -> Self {
        StrategyConfig {
            kind: StrategyKind::EnhancedPassing,
            offense_weight: 0.525,
            fourth_down: FourthDownSource::DecisionFunction,
            yardage: YardageSource::AirYardsPlusYac,
            turnover_dampening: 0.375,
            play_clock: UniformRange::new(17, 30),
            punt_yards: UniformRange::new(40, 55),
            punt_threshold: PUNT_YARDLINE_THRESHOLD,
        }
    }

    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Baseline => StrategyConfig::baseline(),
            StrategyKind::RateBased => StrategyConfig::rate_based(),
            StrategyKind::DistributionBased => StrategyConfig::distribution_based(),
            StrategyKind::EnhancedPassing => StrategyConfig::enhanced_passing(),
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.offense_weight) {
            return Err(SimError::InvalidConfig(format!(
                "offense_weight must lie in [0, 1], got {}",
                self.offense_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.turnover_dampening) {
            return Err(SimError::InvalidConfig(format!(
                "turnover_dampening must lie in [0, 1], got {}",
                self.turnover_dampening
            )));
        }
        // Every play must burn clock or the game never ends
        if self.play_clock.min == 0 || self.play_clock.min > self.play_clock.max {
            return Err(SimError::InvalidConfig(format!(
                "play_clock must be a non-empty range of positive seconds, got {}..={}",
                self.play_clock.min, self.play_clock.max
            )));
        }
        if self.punt_yards.min > self.punt_yards.max {
            return Err(SimError::InvalidConfig(format!(
                "punt_yards range is inverted: {}..={}",
                self.punt_yards.min, self.punt_yards.max
            )));
        }
        if !self.punt_threshold.is_finite() {
            return Err(SimError::InvalidConfig("punt_threshold is not finite".to_string()));
        }
        Ok(())
    }
}

fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

/// Resolves one play at a time from a game state and the two teams.
#[derive(Clone)]
pub struct PlayResolver {
    config: StrategyConfig,
    decider: Option<Arc<dyn FourthDownDecider>>,
    heuristic: FieldPositionHeuristic,
}

impl fmt::Debug for PlayResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayResolver")
            .field("config", &self.config)
            .field("decider", &self.decider.is_some())
            .finish()
    }
}

impl PlayResolver {
    /// Build a resolver, rejecting invalid configurations and a decision
    /// source with no decider behind it.
    pub fn new(
        config: StrategyConfig,
        decider: Option<Arc<dyn FourthDownDecider>>,
    ) -> SimResult<Self> {
        config.validate()?;
        if config.fourth_down == FourthDownSource::DecisionFunction && decider.is_none() {
            return Err(SimError::InvalidConfig(format!(
                "strategy {} needs a fourth-down decision function",
                config.kind
            )));
        }
        Ok(PlayResolver {
            heuristic: FieldPositionHeuristic {
                punt_threshold: config.punt_threshold,
            },
            config,
            decider,
        })
    }

    pub fn baseline() -> Self {
        PlayResolver {
            config: StrategyConfig::baseline(),
            decider: None,
            heuristic: FieldPositionHeuristic::default(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn kind(&self) -> StrategyKind {
        self.config.kind
    }

    fn blend(&self, offense: f64, defense: f64) -> f64 {
        self.config.offense_weight * offense + (1.0 - self.config.offense_weight) * defense
    }

    /// Resolve the next play. Reads the state, never changes it.
    pub fn resolve_play<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        matchup: &Matchup,
        rng: &mut R,
    ) -> PlayOutcome {
        let offense = matchup.team(state.possession());
        let defense = matchup.team(state.defense());
        let time_elapsed = self.config.play_clock.sample(rng);

        let play_type = if state.down() == 4 {
            match self.fourth_down_call(state) {
                FourthDownCall::Punt => {
                    let mut play = self.new_play(PlayType::Punt, state);
                    play.yards_gained = self.config.punt_yards.sample(rng) as f64;
                    play.time_elapsed = time_elapsed;
                    return play;
                }
                FourthDownCall::FieldGoal => {
                    let mut play = self.new_play(PlayType::FieldGoal, state);
                    play.field_goal_made =
                        Some(chance(rng, offense.stats().field_goal_success_rate));
                    play.time_elapsed = time_elapsed;
                    return play;
                }
                FourthDownCall::Run => PlayType::Run,
                FourthDownCall::Pass => PlayType::Pass,
                FourthDownCall::GoForIt => self.choose_play_type(offense, rng),
            }
        } else {
            self.choose_play_type(offense, rng)
        };

        let mut play = self.new_play(play_type, state);
        play.time_elapsed = time_elapsed;
        let mut yards = self.projected_yards(play_type, offense, defense, rng);

        if play_type == PlayType::Pass {
            let completion_rate = self.blend(
                offense.stats().pass_completion_rate,
                defense.stats().pass_completion_rate_allowed,
            );
            let completed = chance(rng, completion_rate);
            play.pass_completed = Some(completed);
            if !completed {
                yards = 0.0;
            }
        }

        let turnover_rate = self.config.turnover_dampening
            * self.blend(offense.stats().turnover_rate, defense.stats().forced_turnover_rate);
        play.turnover = chance(rng, turnover_rate);
        if play.turnover {
            yards = 0.0;
        }

        if play_type == PlayType::Pass {
            let sack_rate = self.blend(
                offense.stats().sacks_allowed_rate,
                defense.stats().sacks_made_rate,
            );
            if chance(rng, sack_rate) {
                play.sack = true;
                play.pass_completed = Some(false);
                yards = -self.blend(
                    offense.stats().sack_yards_allowed,
                    defense.stats().sack_yards_inflicted,
                );
            }
        }

        play.yards_gained = yards;
        play
    }

    fn new_play(&self, play_type: PlayType, state: &GameState) -> PlayOutcome {
        PlayOutcome::new(
            play_type,
            state.possession(),
            state.quarter(),
            state.quarter_seconds_remaining(),
        )
    }

    fn choose_play_type<R: Rng + ?Sized>(&self, offense: &TeamProfile, rng: &mut R) -> PlayType {
        if chance(rng, offense.stats().run_rate) {
            PlayType::Run
        } else {
            PlayType::Pass
        }
    }

    /// Fourth-down call for this play, falling back to field position when
    /// the decision function fails.
    fn fourth_down_call(&self, state: &GameState) -> FourthDownCall {
        let decider = match (self.config.fourth_down, &self.decider) {
            (FourthDownSource::DecisionFunction, Some(decider)) => decider,
            _ => return self.heuristic.call(state.yardline()),
        };

        let features = FourthDownFeatures::from_state(state);
        match decider.decide(&features) {
            Ok(call) => call,
            Err(e) => {
                let fallback = self.heuristic.call(state.yardline());
                warn!(
                    error = %e,
                    yardline = state.yardline(),
                    fallback = %fallback,
                    "fourth-down decision failed, using field position"
                );
                fallback
            }
        }
    }

    fn projected_yards<R: Rng + ?Sized>(
        &self,
        play_type: PlayType,
        offense: &TeamProfile,
        defense: &TeamProfile,
        rng: &mut R,
    ) -> f64 {
        let off = offense.stats();
        let def = defense.stats();
        match (self.config.yardage, play_type) {
            (YardageSource::SeasonAverages, PlayType::Run) => {
                self.blend(off.rush_yards_per_carry, def.rush_yards_per_carry_allowed)
            }
            (YardageSource::SeasonAverages, _) => {
                self.blend(off.yards_per_completion, def.yards_allowed_per_completion)
            }
            (_, PlayType::Run) => self.blend(
                offense.sample_offensive_rushing_yards(rng),
                defense.sample_defensive_rushing_yards(rng),
            ),
            (YardageSource::Distributions, _) => self.blend(
                offense.sample_offensive_passing_yards(rng),
                defense.sample_defensive_passing_yards(rng),
            ),
            (YardageSource::AirYardsPlusYac, _) => {
                let air = self.blend(
                    offense.sample_offensive_air_yards(rng),
                    defense.sample_defensive_air_yards(rng),
                );
                air + self.blend(off.off_yac_per_completion, def.def_yac_per_completion)
            }
        }
    }
}
