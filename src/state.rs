use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::{
    FIRST_DOWN_DISTANCE, GAME_SECONDS, KICKOFF_YARDLINE, QUARTERS, QUARTER_SECONDS,
};
use crate::play::{PlayOutcome, Side};
use crate::team::TeamProfile;

/// The two teams in a game. Profiles are shared read-only.
#[derive(Clone, Debug)]
pub struct Matchup {
    pub home: Arc<TeamProfile>,
    pub away: Arc<TeamProfile>,
}

impl Matchup {
    pub fn new(home: Arc<TeamProfile>, away: Arc<TeamProfile>) -> Self {
        Matchup { home, away }
    }

    pub fn team(&self, side: Side) -> &TeamProfile {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }

    pub(crate) fn add(&mut self, side: Side, points: u32) {
        match side {
            Side::Home => self.home += points,
            Side::Away => self.away += points,
        }
    }

    /// Points for `side` minus points for its opponent.
    pub fn differential(&self, side: Side) -> i32 {
        self.get(side) as i32 - self.get(side.opponent()) as i32
    }

    pub fn total(&self) -> u32 {
        self.home + self.away
    }
}

/// Live state of one simulated game. Only the engine mutates it.
#[derive(Clone, Debug)]
pub struct GameState {
    pub(crate) quarter: u8,
    pub(crate) game_seconds_remaining: u32,
    pub(crate) quarter_seconds_remaining: u32,
    pub(crate) possession: Side,
    pub(crate) yardline: f64,
    pub(crate) down: u8,
    pub(crate) distance: f64,
    pub(crate) score: Score,
    pub(crate) play_log: Vec<PlayOutcome>,
}

impl Default for GameState {
    fn default() -> Self {
        GameState::kickoff()
    }
}

impl GameState {
    /// Opening kickoff: the away team receives.
    pub fn kickoff() -> Self {
        GameState {
            quarter: 1,
            game_seconds_remaining: GAME_SECONDS,
            quarter_seconds_remaining: QUARTER_SECONDS,
            possession: Side::Away,
            yardline: KICKOFF_YARDLINE,
            down: 1,
            distance: FIRST_DOWN_DISTANCE,
            score: Score::default(),
            play_log: Vec::new(),
        }
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    pub fn game_seconds_remaining(&self) -> u32 {
        self.game_seconds_remaining
    }

    pub fn quarter_seconds_remaining(&self) -> u32 {
        self.quarter_seconds_remaining
    }

    /// Seconds left in the current half.
    pub fn half_seconds_remaining(&self) -> u32 {
        if self.quarter % 2 == 1 {
            self.quarter_seconds_remaining + QUARTER_SECONDS
        } else {
            self.quarter_seconds_remaining
        }
    }

    pub fn possession(&self) -> Side {
        self.possession
    }

    pub fn defense(&self) -> Side {
        self.possession.opponent()
    }

    pub fn yardline(&self) -> f64 {
        self.yardline
    }

    pub fn down(&self) -> u8 {
        self.down
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Offense score minus defense score.
    pub fn score_differential(&self) -> i32 {
        self.score.differential(self.possession)
    }

    pub fn play_log(&self) -> &[PlayOutcome] {
        &self.play_log
    }

    /// Hand the ball to `side` with a fresh set of downs.
    pub(crate) fn new_possession(&mut self, side: Side, yardline: f64) {
        self.possession = side;
        self.yardline = yardline;
        self.first_down();
    }

    pub(crate) fn first_down(&mut self) {
        self.down = 1;
        self.distance = FIRST_DOWN_DISTANCE;
    }

    pub(crate) fn into_play_log(self) -> Vec<PlayOutcome> {
        self.play_log
    }

    /// Check every invariant that must hold between plays.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.yardline) {
            return Err(format!("yardline {} outside [0, 100]", self.yardline));
        }
        if !(1..=4).contains(&self.down) {
            return Err(format!("down {} outside 1..=4", self.down));
        }
        if self.distance.is_nan() || self.distance <= 0.0 {
            return Err(format!("distance {} is not positive", self.distance));
        }
        if !(1..=QUARTERS).contains(&self.quarter) {
            return Err(format!("quarter {} outside 1..={}", self.quarter, QUARTERS));
        }
        if self.quarter_seconds_remaining > QUARTER_SECONDS {
            return Err(format!(
                "quarter clock {} exceeds {}",
                self.quarter_seconds_remaining, QUARTER_SECONDS
            ));
        }
        let expected = (QUARTERS - self.quarter) as u32 * QUARTER_SECONDS
            + self.quarter_seconds_remaining;
        if self.game_seconds_remaining != expected {
            return Err(format!(
                "game clock {} disagrees with quarter {} clock {}",
                self.game_seconds_remaining, self.quarter, self.quarter_seconds_remaining
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kickoff_state() {
        let state = GameState::kickoff();
        assert_eq!(state.quarter(), 1);
        assert_eq!(state.game_seconds_remaining(), 3600);
        assert_eq!(state.quarter_seconds_remaining(), 900);
        assert_eq!(state.yardline(), 75.0);
        assert_eq!(state.down(), 1);
        assert_eq!(state.distance(), 10.0);
        assert_eq!(state.score(), Score::default());
        assert!(state.play_log().is_empty());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_half_seconds_remaining() {
        let mut state = GameState::kickoff();
        assert_eq!(state.half_seconds_remaining(), 1800);
        state.quarter = 2;
        state.quarter_seconds_remaining = 120;
        state.game_seconds_remaining = 1920;
        assert_eq!(state.half_seconds_remaining(), 120);
        state.quarter = 3;
        state.quarter_seconds_remaining = 600;
        assert_eq!(state.half_seconds_remaining(), 1500);
    }

    #[test]
    fn test_score_differential_follows_possession() {
        let mut state = GameState::kickoff();
        state.score.add(Side::Home, 10);
        state.score.add(Side::Away, 3);
        assert_eq!(state.possession(), Side::Away);
        assert_eq!(state.score_differential(), -7);
        state.new_possession(Side::Home, 75.0);
        assert_eq!(state.score_differential(), 7);
        assert_eq!(state.score().total(), 13);
    }

    #[test]
    fn test_invariant_violations() {
        let mut state = GameState::kickoff();
        state.down = 5;
        assert!(state.check_invariants().unwrap_err().contains("down"));

        let mut state = GameState::kickoff();
        state.yardline = -2.0;
        assert!(state.check_invariants().unwrap_err().contains("yardline"));

        let mut state = GameState::kickoff();
        state.game_seconds_remaining = 3000;
        assert!(state.check_invariants().unwrap_err().contains("game clock"));
    }
}
