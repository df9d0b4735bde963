//! Play-by-play game state machine.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, trace};

use crate::constants::{
    FIELD_GOAL_POINTS, KICKOFF_YARDLINE, QUARTERS, QUARTER_SECONDS, SAFETY_POINTS,
    TOUCHBACK_YARDLINE, TOUCHDOWN_POINTS,
};
use crate::error::{SimError, SimResult};
use crate::play::{PlayOutcome, PlayType, Side};
use crate::state::{GameState, Matchup};
use crate::strategy::PlayResolver;
use crate::summary::GameSummary;

/// Drives one game from kickoff to the end of the fourth quarter.
///
/// The engine owns its state and random stream; the teams and the resolver
/// are borrowed so many engines can share them across threads.
pub struct GameEngine<'a> {
    matchup: &'a Matchup,
    resolver: &'a PlayResolver,
    state: GameState,
    rng: ChaCha8Rng,
    finished: bool,
}

impl<'a> GameEngine<'a> {
    pub fn new(matchup: &'a Matchup, resolver: &'a PlayResolver, rng: ChaCha8Rng) -> Self {
        GameEngine {
            matchup,
            resolver,
            state: GameState::kickoff(),
            rng,
            finished: false,
        }
    }

    pub fn with_seed(matchup: &'a Matchup, resolver: &'a PlayResolver, seed: u64) -> Self {
        GameEngine::new(matchup, resolver, ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn is_final(&self) -> bool {
        self.finished
    }

    /// Resolve and apply the next play. Does nothing once the game is final.
    pub fn advance_one_play(&mut self) -> SimResult<()> {
        if self.finished {
            return Ok(());
        }
        let play = self
            .resolver
            .resolve_play(&self.state, self.matchup, &mut self.rng);
        self.apply_outcome(play)
    }

    pub(crate) fn apply_outcome(&mut self, mut play: PlayOutcome) -> SimResult<()> {
        let state = &mut self.state;
        let tick = play.time_elapsed.min(state.quarter_seconds_remaining);
        state.quarter_seconds_remaining -= tick;
        state.game_seconds_remaining -= tick;

        let offense = state.possession;
        let defense = offense.opponent();

        match play.play_type {
            _ if play.turnover => {
                let mirrored = 100.0 - state.yardline;
                state.new_possession(defense, mirrored);
            }
            PlayType::Punt => {
                let landing = state.yardline - play.yards_gained;
                let receiver_yardline = if landing <= 0.0 {
                    TOUCHBACK_YARDLINE
                } else {
                    100.0 - landing
                };
                state.new_possession(defense, receiver_yardline);
            }
            PlayType::FieldGoal => {
                if play.field_goal_made == Some(true) {
                    state.score.add(offense, FIELD_GOAL_POINTS);
                }
                state.new_possession(defense, KICKOFF_YARDLINE);
            }
            PlayType::Run | PlayType::Pass => {
                let yardline = state.yardline - play.yards_gained;
                if yardline <= 0.0 {
                    play.touchdown = true;
                    state.score.add(offense, TOUCHDOWN_POINTS);
                    state.new_possession(defense, KICKOFF_YARDLINE);
                } else if yardline >= 100.0 {
                    play.safety = true;
                    state.score.add(defense, SAFETY_POINTS);
                    state.new_possession(defense, KICKOFF_YARDLINE);
                } else if play.yards_gained >= state.distance {
                    state.yardline = yardline;
                    state.first_down();
                } else if state.down >= 4 {
                    play.turnover_on_downs = true;
                    state.new_possession(defense, 100.0 - yardline);
                } else {
                    state.yardline = yardline;
                    state.down += 1;
                    state.distance -= play.yards_gained;
                }
            }
        }

        trace!(
            quarter = play.quarter,
            clock = play.quarter_seconds_remaining,
            offense = ?play.offense,
            play = play.play_type.as_str(),
            yards = play.yards_gained,
            home = state.score.home,
            away = state.score.away,
            "play"
        );
        state.play_log.push(play);

        if state.quarter_seconds_remaining == 0 {
            match state.quarter {
                // Away received the opening kickoff, so home receives the second half
                2 => {
                    state.quarter = 3;
                    state.quarter_seconds_remaining = QUARTER_SECONDS;
                    state.new_possession(Side::Home, KICKOFF_YARDLINE);
                }
                q if q >= QUARTERS => self.finished = true,
                _ => {
                    state.quarter += 1;
                    state.quarter_seconds_remaining = QUARTER_SECONDS;
                }
            }
        }

        if let Err(reason) = state.check_invariants() {
            let play = state.play_log.len();
            error!(play, %reason, "malformed game state, aborting game");
            self.finished = true;
            return Err(SimError::MalformedGameState { play, reason });
        }
        Ok(())
    }

    /// Play the game out and summarize it.
    pub fn run_simulation(mut self) -> SimResult<GameSummary> {
        while !self.finished {
            self.advance_one_play()?;
        }
        let score = self.state.score;
        Ok(GameSummary::from_play_log(
            self.matchup.home.name(),
            self.matchup.away.name(),
            score,
            self.state.into_play_log(),
        ))
    }
}
