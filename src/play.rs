use serde::{Deserialize, Serialize};

use crate::constants::{GAME_SECONDS, QUARTER_SECONDS};

/// One of the two teams in a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Run,
    Pass,
    Punt,
    FieldGoal,
}

impl PlayType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayType::Run => "run",
            PlayType::Pass => "pass",
            PlayType::Punt => "punt",
            PlayType::FieldGoal => "field_goal",
        }
    }
}

/// Result of a single resolved play.
///
/// Produced by a resolver; the engine fills in the scoring and possession
/// flags (`touchdown`, `safety`, `turnover_on_downs`) when it applies the
/// play, before appending it to the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayOutcome {
    pub play_type: PlayType,
    pub yards_gained: f64,
    pub time_elapsed: u32,
    pub turnover: bool,
    pub touchdown: bool,
    pub field_goal_made: Option<bool>,
    /// Set on pass plays only
    pub pass_completed: Option<bool>,
    pub sack: bool,
    pub safety: bool,
    pub turnover_on_downs: bool,
    /// Quarter at the snap
    pub quarter: u8,
    /// Quarter clock at the snap
    pub quarter_seconds_remaining: u32,
    pub offense: Side,
}

impl PlayOutcome {
    pub(crate) fn new(play_type: PlayType, offense: Side, quarter: u8, quarter_seconds_remaining: u32) -> Self {
        PlayOutcome {
            play_type,
            yards_gained: 0.0,
            time_elapsed: 0,
            turnover: false,
            touchdown: false,
            field_goal_made: None,
            pass_completed: None,
            sack: false,
            safety: false,
            turnover_on_downs: false,
            quarter,
            quarter_seconds_remaining,
            offense,
        }
    }

    /// Seconds of game time elapsed once this play ended.
    pub fn game_time_elapsed(&self) -> u32 {
        let before_snap = (self.quarter.saturating_sub(1) as u32) * QUARTER_SECONDS
            + QUARTER_SECONDS.saturating_sub(self.quarter_seconds_remaining);
        let played = self.time_elapsed.min(self.quarter_seconds_remaining);
        (before_snap + played).min(GAME_SECONDS)
    }
}
