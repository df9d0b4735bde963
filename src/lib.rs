//! Gridiron Core - Monte Carlo play-by-play simulation of American football
//! games.
//!
//! Two team statistical profiles go in; many independent simulated games come
//! out, aggregated into win probabilities, score expectations and per-team box
//! scores. Python bindings are available behind the `python` feature.

pub mod constants;
pub mod decision;
pub mod engine;
pub mod error;
pub mod play;
pub mod service;
pub mod simulation;
pub mod state;
pub mod strategy;
pub mod summary;
pub mod team;

#[cfg(feature = "python")]
mod python;

pub use decision::{
    ClassLabels, ClassifierDecider, DecisionError, FieldPositionHeuristic, FourthDownCall,
    FourthDownDecider, FourthDownFeatures,
};
pub use engine::GameEngine;
pub use error::{SimError, SimResult};
pub use play::{PlayOutcome, PlayType, Side};
pub use service::{SimulationRequest, SimulationService, TeamRegistry};
pub use simulation::{AggregateReport, CancelFlag, SimulationConfig, Simulator};
pub use state::{GameState, Matchup, Score};
pub use strategy::{PlayResolver, StrategyConfig, StrategyKind};
pub use summary::{FeaturedGame, GameSummary, TeamBoxScore};
pub use team::{TeamProfile, TeamStats};
