//! Fourth-down play calling.
//!
//! A decider is an injected pure function from game-situation features to a
//! play call. The field-position heuristic is always available as the
//! fallback; `ClassifierDecider` adapts a pre-trained model that predicts an
//! integer class.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::PUNT_YARDLINE_THRESHOLD;
use crate::state::GameState;

/// Inputs to a fourth-down decision, in the order the classifier was trained
/// on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FourthDownFeatures {
    pub game_seconds_remaining: u32,
    pub half_seconds_remaining: u32,
    /// Yards to go
    pub distance: f64,
    /// Distance to the opponent goal line
    pub yardline: f64,
    /// Offense score minus defense score
    pub score_differential: i32,
}

impl FourthDownFeatures {
    pub fn from_state(state: &GameState) -> Self {
        FourthDownFeatures {
            game_seconds_remaining: state.game_seconds_remaining(),
            half_seconds_remaining: state.half_seconds_remaining(),
            distance: state.distance(),
            yardline: state.yardline(),
            score_differential: state.score_differential(),
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.game_seconds_remaining as f64,
            self.half_seconds_remaining as f64,
            self.distance,
            self.yardline,
            self.score_differential as f64,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FourthDownCall {
    Run,
    Pass,
    Punt,
    FieldGoal,
    /// Run or pass, chosen afterwards from the offense's tendencies
    GoForIt,
}

impl FromStr for FourthDownCall {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(FourthDownCall::Run),
            "pass" => Ok(FourthDownCall::Pass),
            "punt" => Ok(FourthDownCall::Punt),
            "field_goal" | "fg" => Ok(FourthDownCall::FieldGoal),
            "goforit" | "go_for_it" => Ok(FourthDownCall::GoForIt),
            other => Err(DecisionError::UnknownCall(other.to_string())),
        }
    }
}

impl fmt::Display for FourthDownCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FourthDownCall::Run => "run",
            FourthDownCall::Pass => "pass",
            FourthDownCall::Punt => "punt",
            FourthDownCall::FieldGoal => "field_goal",
            FourthDownCall::GoForIt => "goforit",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("unrecognized class index {0}")]
    UnknownClass(usize),

    #[error("unrecognized play call {0:?}")]
    UnknownCall(String),

    #[error("decision function failed: {0}")]
    Failed(String),
}

/// Fourth-down decision function, invoked once per fourth down.
pub trait FourthDownDecider: Send + Sync {
    fn decide(&self, features: &FourthDownFeatures) -> Result<FourthDownCall, DecisionError>;
}

impl<F> FourthDownDecider for F
where
    F: Fn(&FourthDownFeatures) -> Result<FourthDownCall, DecisionError> + Send + Sync,
{
    fn decide(&self, features: &FourthDownFeatures) -> Result<FourthDownCall, DecisionError> {
        self(features)
    }
}

/// Punt from deep in your own territory, otherwise kick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldPositionHeuristic {
    pub punt_threshold: f64,
}

impl Default for FieldPositionHeuristic {
    fn default() -> Self {
        FieldPositionHeuristic {
            punt_threshold: PUNT_YARDLINE_THRESHOLD,
        }
    }
}

impl FieldPositionHeuristic {
    pub fn call(&self, yardline: f64) -> FourthDownCall {
        if yardline > self.punt_threshold {
            FourthDownCall::Punt
        } else {
            FourthDownCall::FieldGoal
        }
    }
}

impl FourthDownDecider for FieldPositionHeuristic {
    fn decide(&self, features: &FourthDownFeatures) -> Result<FourthDownCall, DecisionError> {
        Ok(self.call(features.yardline))
    }
}

/// Mapping from a classifier's output index to a play call.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassLabels(Vec<FourthDownCall>);

impl ClassLabels {
    pub fn new(labels: Vec<FourthDownCall>) -> Self {
        ClassLabels(labels)
    }

    /// run / pass / punt / field goal
    pub fn four_way() -> Self {
        ClassLabels(vec![
            FourthDownCall::Run,
            FourthDownCall::Pass,
            FourthDownCall::Punt,
            FourthDownCall::FieldGoal,
        ])
    }

    /// go for it / field goal / punt
    pub fn go_for_it() -> Self {
        ClassLabels(vec![
            FourthDownCall::GoForIt,
            FourthDownCall::FieldGoal,
            FourthDownCall::Punt,
        ])
    }

    pub fn label(&self, class: usize) -> Result<FourthDownCall, DecisionError> {
        self.0
            .get(class)
            .copied()
            .ok_or(DecisionError::UnknownClass(class))
    }
}

/// Adapts a class-index predictor to the decider interface.
pub struct ClassifierDecider<P> {
    predict: P,
    labels: ClassLabels,
}

impl<P> ClassifierDecider<P>
where
    P: Fn(&[f64; 5]) -> usize + Send + Sync,
{
    pub fn new(predict: P, labels: ClassLabels) -> Self {
        ClassifierDecider { predict, labels }
    }
}

impl<P> FourthDownDecider for ClassifierDecider<P>
where
    P: Fn(&[f64; 5]) -> usize + Send + Sync,
{
    fn decide(&self, features: &FourthDownFeatures) -> Result<FourthDownCall, DecisionError> {
        let class = (self.predict)(&features.as_array());
        self.labels.label(class)
    }
}
