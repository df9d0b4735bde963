//! Monte Carlo orchestration.
//!
//! A batch of N games is split into contiguous chunks, one per worker. Game
//! `i` always draws from stream `i` of a `ChaCha8Rng` seeded with the batch
//! seed, so a report depends only on the seed and N, never on how the games
//! were spread over threads.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::engine::GameEngine;
use crate::error::{SimError, SimResult};
use crate::play::Side;
use crate::state::Matchup;
use crate::strategy::PlayResolver;
use crate::summary::{FeaturedGame, GameSummary, TeamBoxScore};

/// Stream reserved for picking the featured game.
const FEATURED_STREAM: u64 = u64::MAX;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Batch seed; drawn from entropy when absent
    pub seed: Option<u64>,
    /// Worker threads for `run`; rayon's default when absent
    pub workers: Option<usize>,
    pub featured_game: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: None,
            workers: None,
            featured_game: true,
        }
    }
}

/// Shared flag that stops a batch from starting any further chunks.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregated outcome of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub home_team: String,
    pub away_team: String,
    pub strategy: String,
    pub seed: u64,
    pub games_requested: usize,
    pub games_completed: usize,
    /// Games stopped by an invalid game state
    pub games_aborted: usize,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub home_wins: usize,
    pub away_wins: usize,
    pub ties: usize,
    pub home_win_pct: f64,
    /// Home minus away
    pub mean_score_differential: f64,
    pub mean_total_score: f64,
    pub home: TeamBoxScore,
    pub away: TeamBoxScore,
    pub featured: Option<FeaturedGame>,
}

impl AggregateReport {
    pub fn away_win_pct(&self) -> f64 {
        100.0 * self.away_wins as f64 / self.games_completed as f64
    }

    pub fn tie_pct(&self) -> f64 {
        100.0 * self.ties as f64 / self.games_completed as f64
    }

    /// True when some requested games are missing from the aggregates.
    pub fn is_partial(&self) -> bool {
        self.games_completed < self.games_requested
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} wins {:.2} percent of the time against {} over {} simulations ({}). \
             Average score difference: {:+.2}. Average total score: {:.2}.",
            self.home_team,
            self.home_win_pct,
            self.away_team,
            self.games_completed,
            self.strategy,
            self.mean_score_differential,
            self.mean_total_score,
        );
        if self.is_partial() {
            line.push_str(&format!(
                " Partial result: {} of {} games completed.",
                self.games_completed, self.games_requested
            ));
        }
        line
    }
}

enum ChunkOutcome {
    Completed {
        games: Vec<(usize, GameSummary)>,
        aborted: usize,
    },
    Cancelled,
    Failed,
}

pub struct Simulator {
    matchup: Matchup,
    resolver: PlayResolver,
    config: SimulationConfig,
    seed: u64,
    cancel: CancelFlag,
}

impl Simulator {
    pub fn new(matchup: Matchup, resolver: PlayResolver, config: SimulationConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| ChaCha8Rng::from_entropy().gen::<u64>());
        Simulator {
            matchup,
            resolver,
            config,
            seed,
            cancel: CancelFlag::new(),
        }
    }

    /// Batch seed in use, whether configured or drawn.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn matchup(&self) -> &Matchup {
        &self.matchup
    }

    /// A single game on stream 0 of `seed`.
    pub fn run_one(&self, seed: u64) -> SimResult<GameSummary> {
        GameEngine::with_seed(&self.matchup, &self.resolver, seed).run_simulation()
    }

    /// `n` games on the calling thread.
    pub fn run_many(&self, n: usize) -> SimResult<AggregateReport> {
        check_batch(n, 1)?;
        self.log_start(n, 1);
        let featured = self.featured_index(n);
        let chunks = partition(n, 1);
        let outcomes: Vec<ChunkOutcome> = chunks
            .iter()
            .map(|c| self.run_chunk(c.clone(), featured))
            .collect();
        self.aggregate(n, outcomes, featured)
    }

    /// `n` games over a dedicated pool of `workers` threads.
    pub fn run_many_parallel(&self, n: usize, workers: usize) -> SimResult<AggregateReport> {
        check_batch(n, workers)?;
        self.log_start(n, workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| SimError::WorkerPool(e.to_string()))?;
        let featured = self.featured_index(n);
        let chunks = partition(n, workers);
        let outcomes: Vec<ChunkOutcome> = pool.install(|| {
            chunks
                .par_iter()
                .map(|c| self.run_chunk(c.clone(), featured))
                .collect()
        });
        self.aggregate(n, outcomes, featured)
    }

    /// `n` games with the configured worker count.
    pub fn run(&self, n: usize) -> SimResult<AggregateReport> {
        let workers = self
            .config
            .workers
            .unwrap_or_else(rayon::current_num_threads);
        if workers <= 1 {
            self.run_many(n)
        } else {
            self.run_many_parallel(n, workers)
        }
    }

    fn game_rng(&self, index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64);
        rng
    }

    fn run_game(&self, index: usize) -> SimResult<GameSummary> {
        GameEngine::new(&self.matchup, &self.resolver, self.game_rng(index)).run_simulation()
    }

    /// Game whose play log is kept for the detailed breakdown, drawn on its
    /// own stream before any game runs.
    fn featured_index(&self, n: usize) -> Option<usize> {
        if !self.config.featured_game {
            return None;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(FEATURED_STREAM);
        Some(rng.gen_range(0..n))
    }

    fn run_chunk(&self, games: Range<usize>, featured: Option<usize>) -> ChunkOutcome {
        if self.cancel.is_cancelled() {
            debug!(start = games.start, end = games.end, "chunk skipped after cancellation");
            return ChunkOutcome::Cancelled;
        }

        let range = games.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut completed = Vec::with_capacity(range.len());
            let mut aborted = 0;
            for index in range {
                match self.run_game(index) {
                    Ok(summary) if Some(index) == featured => completed.push((index, summary)),
                    Ok(summary) => completed.push((index, summary.compact())),
                    Err(e) => {
                        error!(game = index, error = %e, "game aborted");
                        aborted += 1;
                    }
                }
            }
            (completed, aborted)
        }));

        match result {
            Ok((completed, aborted)) => {
                debug!(
                    start = games.start,
                    end = games.end,
                    completed = completed.len(),
                    aborted,
                    "chunk finished"
                );
                ChunkOutcome::Completed {
                    games: completed,
                    aborted,
                }
            }
            Err(_) => {
                error!(start = games.start, end = games.end, "chunk panicked");
                ChunkOutcome::Failed
            }
        }
    }

    fn aggregate(
        &self,
        n: usize,
        outcomes: Vec<ChunkOutcome>,
        featured: Option<usize>,
    ) -> SimResult<AggregateReport> {
        let chunks_total = outcomes.len();
        let mut chunks_completed = 0;
        let mut cancelled = 0;
        let mut games_aborted = 0;
        let mut games: Vec<(usize, GameSummary)> = Vec::with_capacity(n);

        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Completed {
                    games: chunk_games,
                    aborted,
                } => {
                    chunks_completed += 1;
                    games_aborted += aborted;
                    games.extend(chunk_games);
                }
                ChunkOutcome::Cancelled => cancelled += 1,
                ChunkOutcome::Failed => {}
            }
        }
        games.sort_by_key(|(index, _)| *index);

        if games.is_empty() {
            return Err(if cancelled > 0 {
                SimError::Cancelled {
                    completed_chunks: chunks_completed,
                    total_chunks: chunks_total,
                }
            } else {
                SimError::WorkerFailure {
                    completed_chunks: chunks_completed,
                    total_chunks: chunks_total,
                }
            });
        }

        let completed = games.len();
        let mut home_wins = 0;
        let mut away_wins = 0;
        let mut ties = 0;
        let mut differential = 0i64;
        let mut total_score = 0u64;
        for (_, game) in &games {
            match game.winner() {
                Some(Side::Home) => home_wins += 1,
                Some(Side::Away) => away_wins += 1,
                None => ties += 1,
            }
            differential += game.score_differential() as i64;
            total_score += game.total_score() as u64;
        }

        // Missing when its chunk failed or the game itself was aborted
        let featured = featured.and_then(|index| {
            games
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, summary)| FeaturedGame::from_summary(index, summary.clone()))
        });
        if self.config.featured_game && featured.is_none() {
            warn!("featured game did not complete, report has no breakdown");
        }

        let report = AggregateReport {
            home_team: self.matchup.home.name().to_string(),
            away_team: self.matchup.away.name().to_string(),
            strategy: self.resolver.kind().code().to_string(),
            seed: self.seed,
            games_requested: n,
            games_completed: completed,
            games_aborted,
            chunks_total,
            chunks_completed,
            home_wins,
            away_wins,
            ties,
            home_win_pct: 100.0 * home_wins as f64 / completed as f64,
            mean_score_differential: differential as f64 / completed as f64,
            mean_total_score: total_score as f64 / completed as f64,
            home: TeamBoxScore::mean(games.iter().map(|(_, g)| &g.home)),
            away: TeamBoxScore::mean(games.iter().map(|(_, g)| &g.away)),
            featured,
        };

        if report.is_partial() {
            warn!(
                completed = report.games_completed,
                requested = n,
                chunks_completed,
                chunks_total,
                "partial simulation batch"
            );
        }
        info!(
            home = %report.home_team,
            away = %report.away_team,
            home_win_pct = report.home_win_pct,
            games = report.games_completed,
            "simulation batch finished"
        );
        Ok(report)
    }

    fn log_start(&self, n: usize, workers: usize) {
        info!(
            home = self.matchup.home.name(),
            away = self.matchup.away.name(),
            strategy = self.resolver.kind().code(),
            games = n,
            workers,
            seed = self.seed,
            "simulation batch started"
        );
    }
}

fn check_batch(n: usize, workers: usize) -> SimResult<()> {
    if n == 0 {
        return Err(SimError::InvalidConfig(
            "number of simulations must be positive".to_string(),
        ));
    }
    if workers == 0 {
        return Err(SimError::InvalidConfig(
            "worker count must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Contiguous ranges of at most `ceil(n / workers)` games.
fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let chunk_size = n.div_ceil(workers).max(1);
    (0..n)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionError, FourthDownCall, FourthDownDecider, FourthDownFeatures};
    use crate::strategy::{StrategyConfig, UniformRange};
    use crate::team::{sample_stats, TeamProfile};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn make_matchup() -> Matchup {
        Matchup::new(
            Arc::new(TeamProfile::new(sample_stats("NE")).unwrap()),
            Arc::new(TeamProfile::new(sample_stats("NYG")).unwrap()),
        )
    }

    fn make_simulator(resolver: PlayResolver, seed: u64) -> Simulator {
        let config = SimulationConfig {
            seed: Some(seed),
            ..Default::default()
        };
        Simulator::new(make_matchup(), resolver, config)
    }

    #[test]
    fn test_partition() {
        assert_eq!(partition(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(partition(40, 4), vec![0..10, 10..20, 20..30, 30..40]);
        assert_eq!(partition(2, 8), vec![0..1, 1..2]);
        assert_eq!(partition(5, 1), vec![0..5]);
    }

    #[test]
    fn test_config_defaults() {
        let config: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert!(config.featured_game);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let sim = make_simulator(PlayResolver::baseline(), 1);
        assert!(matches!(sim.run_many(0), Err(SimError::InvalidConfig(_))));
        assert!(matches!(
            sim.run_many_parallel(10, 0),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_game_batch_matches_run_one() {
        let sim = make_simulator(PlayResolver::baseline(), 99);
        let report = sim.run_many(1).unwrap();
        let game = sim.run_one(99).unwrap();

        assert_eq!(report.games_completed, 1);
        let featured = report.featured.unwrap();
        assert_eq!(featured.index, 0);
        assert_eq!(featured.summary, game);
        assert_eq!(report.mean_score_differential, game.score_differential() as f64);
    }

    #[test]
    fn test_win_pct_accounting() {
        let sim = make_simulator(PlayResolver::baseline(), 5);
        let report = sim.run_many(200).unwrap();
        assert_eq!(report.games_completed, 200);
        assert_eq!(report.home_wins + report.away_wins + report.ties, 200);
        assert!((0.0..=100.0).contains(&report.home_win_pct));
        assert_eq!(
            report.home_win_pct,
            100.0 * report.home_wins as f64 / report.games_completed as f64
        );
        assert!(!report.is_partial());
        assert!(report.summary_line().starts_with("NE wins"));
        assert!(report.home.plays > 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sim = make_simulator(PlayResolver::baseline(), 314);
        let sequential = sim.run_many(60).unwrap();
        let parallel = sim.run_many_parallel(60, 4).unwrap();
        assert_eq!(parallel.chunks_total, 4);
        assert_eq!(parallel.home_wins, sequential.home_wins);
        assert_eq!(parallel.ties, sequential.ties);
        assert_eq!(parallel.mean_score_differential, sequential.mean_score_differential);
        assert_eq!(parallel.home, sequential.home);
        assert_eq!(parallel.featured, sequential.featured);
    }

    #[test]
    fn test_identical_teams_are_balanced() {
        // Short play clock means more possessions, so regulation ties stay rare
        let config = StrategyConfig {
            play_clock: UniformRange::new(5, 15),
            ..StrategyConfig::baseline()
        };
        let resolver = PlayResolver::new(config, None).unwrap();
        let sim = make_simulator(resolver, 20_240_901);
        let report = sim.run_many_parallel(10_000, 4).unwrap();
        assert!(
            (report.home_win_pct - 50.0).abs() < 3.0,
            "home win pct {:.2} outside 50 +/- 3",
            report.home_win_pct
        );
        assert!((report.home_win_pct - report.away_win_pct()).abs() < 6.0);
        assert!(report.tie_pct() < 5.0);
    }

    #[test]
    fn test_panicking_chunk_is_excluded() {
        init_tracing();
        let tripped = Arc::new(AtomicBool::new(false));
        let flag = tripped.clone();
        let decider: Arc<dyn FourthDownDecider> = Arc::new(
            move |_: &FourthDownFeatures| -> Result<FourthDownCall, DecisionError> {
                if !flag.swap(true, Ordering::SeqCst) {
                    panic!("decider crashed");
                }
                Ok(FourthDownCall::Punt)
            },
        );
        let resolver = PlayResolver::new(StrategyConfig::rate_based(), Some(decider)).unwrap();
        let sim = make_simulator(resolver, 7);

        let report = sim.run_many_parallel(40, 4).unwrap();
        assert_eq!(report.chunks_total, 4);
        assert_eq!(report.chunks_completed, 3);
        assert_eq!(report.games_completed, 30);
        assert!(report.is_partial());
        assert!(report.summary_line().contains("Partial result: 30 of 40"));
    }

    #[test]
    fn test_featured_game_comes_from_worker_run() {
        init_tracing();
        let caller = std::thread::current().id();
        let decider: Arc<dyn FourthDownDecider> = Arc::new(
            move |f: &FourthDownFeatures| -> Result<FourthDownCall, DecisionError> {
                if std::thread::current().id() == caller {
                    panic!("decider called outside the worker pool");
                }
                if f.yardline > 55.0 {
                    Ok(FourthDownCall::Punt)
                } else {
                    Ok(FourthDownCall::FieldGoal)
                }
            },
        );
        let resolver = PlayResolver::new(StrategyConfig::rate_based(), Some(decider)).unwrap();
        let sim = make_simulator(resolver, 21);

        let report = sim.run_many_parallel(40, 4).unwrap();
        assert_eq!(report.games_completed, 40);
        let featured = report.featured.unwrap();
        assert!(featured.index < 40);
        assert_eq!(featured.summary.play_log.len(), featured.summary.play_count);
        assert!(featured.summary.play_count > 0);
    }

    #[test]
    fn test_featured_game_lost_with_its_chunk() {
        let sim = make_simulator(PlayResolver::baseline(), 17);
        let featured = sim.featured_index(40).unwrap();
        let outcomes = partition(40, 4)
            .into_iter()
            .map(|chunk| {
                if chunk.contains(&featured) {
                    ChunkOutcome::Failed
                } else {
                    sim.run_chunk(chunk, Some(featured))
                }
            })
            .collect();
        let report = sim.aggregate(40, outcomes, Some(featured)).unwrap();
        assert_eq!(report.games_completed, 30);
        assert!(report.featured.is_none());
    }

    #[test]
    fn test_all_chunks_failing_is_an_error() {
        let decider: Arc<dyn FourthDownDecider> = Arc::new(
            |_: &FourthDownFeatures| -> Result<FourthDownCall, DecisionError> {
                panic!("decider crashed")
            },
        );
        let resolver = PlayResolver::new(StrategyConfig::rate_based(), Some(decider)).unwrap();
        let sim = make_simulator(resolver, 7);
        assert!(matches!(
            sim.run_many_parallel(8, 2),
            Err(SimError::WorkerFailure {
                completed_chunks: 0,
                total_chunks: 2
            })
        ));
    }

    #[test]
    fn test_cancel_before_start() {
        init_tracing();
        let sim = make_simulator(PlayResolver::baseline(), 11);
        sim.cancel_flag().cancel();
        assert!(matches!(
            sim.run_many_parallel(20, 2),
            Err(SimError::Cancelled {
                completed_chunks: 0,
                total_chunks: 2
            })
        ));
    }

    #[test]
    fn test_cancel_inside_running_chunk_finishes_it() {
        let sim_flag = CancelFlag::new();
        let flag = sim_flag.clone();
        let decider: Arc<dyn FourthDownDecider> = Arc::new(
            move |_: &FourthDownFeatures| -> Result<FourthDownCall, DecisionError> {
                flag.cancel();
                Ok(FourthDownCall::FieldGoal)
            },
        );
        let resolver = PlayResolver::new(StrategyConfig::rate_based(), Some(decider)).unwrap();
        let mut sim = make_simulator(resolver, 13);
        sim.cancel = sim_flag;

        let report = sim.run_many(25).unwrap();
        assert_eq!(report.games_completed, 25);
        assert!(sim.cancel_flag().is_cancelled());
    }

    #[test]
    fn test_seed_is_recorded_when_drawn() {
        let sim = Simulator::new(
            make_matchup(),
            PlayResolver::baseline(),
            SimulationConfig {
                featured_game: false,
                ..Default::default()
            },
        );
        let report = sim.run_many(3).unwrap();
        assert_eq!(report.seed, sim.seed());
        assert!(report.featured.is_none());
    }
}
