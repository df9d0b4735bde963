//! Request-level entry point over a registry of team profiles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::decision::FourthDownDecider;
use crate::error::{SimError, SimResult};
use crate::simulation::{AggregateReport, SimulationConfig, Simulator};
use crate::state::Matchup;
use crate::strategy::{FourthDownSource, PlayResolver, StrategyConfig, StrategyKind};
use crate::team::{TeamProfile, TeamStats};

/// Validated team profiles keyed by team code.
#[derive(Clone, Debug, Default)]
pub struct TeamRegistry {
    teams: BTreeMap<String, Arc<TeamProfile>>,
}

impl TeamRegistry {
    pub fn new() -> Self {
        TeamRegistry::default()
    }

    /// Load a JSON array of statistics records. The first invalid record
    /// fails the whole load.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut registry = TeamRegistry::new();
        for record in records {
            let team = record
                .get("team")
                .and_then(|t| t.as_str())
                .unwrap_or("<unnamed>")
                .to_string();
            let stats: TeamStats = serde_json::from_value(record)
                .map_err(|e| SimError::invalid_stats(&team, e.to_string()))?;
            registry.insert(TeamProfile::new(stats)?);
        }
        Ok(registry)
    }

    /// Add or replace a team.
    pub fn insert(&mut self, profile: TeamProfile) {
        self.teams
            .insert(profile.name().to_string(), Arc::new(profile));
    }

    pub fn get(&self, code: &str) -> SimResult<Arc<TeamProfile>> {
        self.teams
            .get(code)
            .cloned()
            .ok_or_else(|| SimError::UnknownTeam(code.to_string()))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.teams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

fn default_strategy() -> String {
    StrategyKind::Baseline.code().to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub home_team: String,
    pub away_team: String,
    pub num_simulations: usize,
    /// Model code (`proto`, `v1`, `v1a`, `v1b`)
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
}

pub struct SimulationService {
    registry: TeamRegistry,
    decider: Option<Arc<dyn FourthDownDecider>>,
}

impl SimulationService {
    pub fn new(registry: TeamRegistry) -> Self {
        SimulationService {
            registry,
            decider: None,
        }
    }

    /// Fourth-down decision function for the variants that need one.
    pub fn with_decider(mut self, decider: Arc<dyn FourthDownDecider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn registry(&self) -> &TeamRegistry {
        &self.registry
    }

    pub fn handle(&self, request: &SimulationRequest) -> SimResult<AggregateReport> {
        let home = self.registry.get(&request.home_team)?;
        let away = self.registry.get(&request.away_team)?;
        let kind = StrategyKind::from_code(&request.strategy)?;
        if request.num_simulations == 0 {
            return Err(SimError::InvalidConfig(
                "num_simulations must be positive".to_string(),
            ));
        }

        let config = StrategyConfig::for_kind(kind);
        let decider = match config.fourth_down {
            FourthDownSource::DecisionFunction => self.decider.clone(),
            FourthDownSource::Heuristic => None,
        };
        let resolver = PlayResolver::new(config, decider)?;

        info!(
            home = %request.home_team,
            away = %request.away_team,
            strategy = kind.code(),
            n = request.num_simulations,
            "handling simulation request"
        );
        let simulator = Simulator::new(
            Matchup::new(home, away),
            resolver,
            SimulationConfig {
                seed: request.seed,
                workers: request.workers,
                featured_game: true,
            },
        );
        simulator.run(request.num_simulations)
    }
}
