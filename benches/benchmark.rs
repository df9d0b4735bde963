use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use gridiron_core::decision::{DecisionError, FourthDownCall, FourthDownDecider, FourthDownFeatures};
use gridiron_core::engine::GameEngine;
use gridiron_core::simulation::{SimulationConfig, Simulator};
use gridiron_core::state::Matchup;
use gridiron_core::strategy::{PlayResolver, StrategyConfig};
use gridiron_core::team::{TeamProfile, TeamStats};

fn league_average(team: &str) -> TeamStats {
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

fn create_matchup() -> Matchup {
    let mut home = league_average("KC");
    home.run_rate = 0.40;
    home.pass_rate = 0.60;
    home.pass_completion_rate = 67.5;
    let away = league_average("BUF");
    Matchup::new(
        Arc::new(TeamProfile::new(home).unwrap()),
        Arc::new(TeamProfile::new(away).unwrap()),
    )
}

fn field_position_decider() -> Arc<dyn FourthDownDecider> {
    Arc::new(
        |f: &FourthDownFeatures| -> Result<FourthDownCall, DecisionError> {
            if f.distance <= 1.0 && f.yardline < 50.0 {
                Ok(FourthDownCall::GoForIt)
            } else if f.yardline > 60.0 {
                Ok(FourthDownCall::Punt)
            } else {
                Ok(FourthDownCall::FieldGoal)
            }
        },
    )
}

fn create_simulator(config: StrategyConfig) -> Simulator {
    let resolver = PlayResolver::new(config, Some(field_position_decider())).unwrap();
    Simulator::new(
        create_matchup(),
        resolver,
        SimulationConfig {
            seed: Some(42),
            workers: None,
            featured_game: false,
        },
    )
}

fn bench_single_game(c: &mut Criterion) {
    let matchup = create_matchup();
    let baseline = PlayResolver::baseline();
    let enhanced =
        PlayResolver::new(StrategyConfig::enhanced_passing(), Some(field_position_decider()))
            .unwrap();

    c.bench_function("single_game_baseline", |b| {
        b.iter(|| {
            GameEngine::with_seed(&matchup, &baseline, black_box(7))
                .run_simulation()
                .unwrap()
        })
    });

    c.bench_function("single_game_enhanced_passing", |b| {
        b.iter(|| {
            GameEngine::with_seed(&matchup, &enhanced, black_box(7))
                .run_simulation()
                .unwrap()
        })
    });
}

fn bench_batch(c: &mut Criterion) {
    let simulator = create_simulator(StrategyConfig::distribution_based());

    let mut group = c.benchmark_group("batch_1000");
    group.sample_size(10);

    group.bench_function("sequential", |b| {
        b.iter(|| simulator.run_many(black_box(1000)).unwrap())
    });

    group.bench_function("parallel_4", |b| {
        b.iter(|| simulator.run_many_parallel(black_box(1000), 4).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_single_game, bench_batch);
criterion_main!(benches);
