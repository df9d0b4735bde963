//! Reductions of a finished game's play log.

use serde::{Deserialize, Serialize};

use crate::constants::{FIELD_GOAL_POINTS, SAFETY_POINTS, TOUCHDOWN_POINTS};
use crate::play::{PlayOutcome, PlayType, Side};
use crate::state::Score;

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        100.0 * part / whole
    } else {
        0.0
    }
}

fn per(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole
    } else {
        0.0
    }
}

/// Per-team box score. Rates are percentages (0-100).
///
/// Every field is `f64` so the same type holds both a single game and the
/// mean over a batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamBoxScore {
    pub score: f64,
    pub plays: f64,
    pub run_rate: f64,
    pub pass_rate: f64,
    pub pass_attempts: f64,
    pub completions: f64,
    pub pass_cmp_rate: f64,
    pub pass_yards: f64,
    pub passing_tds: f64,
    pub sacks_allowed: f64,
    pub pass_yards_per_play: f64,
    pub rushing_attempts: f64,
    pub rushing_yards: f64,
    pub rushing_tds: f64,
    pub rush_yards_per_play: f64,
    pub total_turnovers: f64,
    pub field_goal_attempts: f64,
    pub field_goals_made: f64,
    pub fg_pct: f64,
}

impl TeamBoxScore {
    /// Box score for the plays `side` ran. Sack yardage counts against
    /// passing yards.
    pub fn from_plays(side: Side, score: u32, plays: &[PlayOutcome]) -> Self {
        let mut box_score = TeamBoxScore {
            score: score as f64,
            ..Default::default()
        };
        for play in plays.iter().filter(|p| p.offense == side) {
            box_score.plays += 1.0;
            if play.turnover {
                box_score.total_turnovers += 1.0;
            }
            match play.play_type {
                PlayType::Pass => {
                    box_score.pass_attempts += 1.0;
                    box_score.pass_yards += play.yards_gained;
                    if play.pass_completed == Some(true) {
                        box_score.completions += 1.0;
                    }
                    if play.sack {
                        box_score.sacks_allowed += 1.0;
                    }
                    if play.touchdown {
                        box_score.passing_tds += 1.0;
                    }
                }
                PlayType::Run => {
                    box_score.rushing_attempts += 1.0;
                    box_score.rushing_yards += play.yards_gained;
                    if play.touchdown {
                        box_score.rushing_tds += 1.0;
                    }
                }
                PlayType::FieldGoal => {
                    box_score.field_goal_attempts += 1.0;
                    if play.field_goal_made == Some(true) {
                        box_score.field_goals_made += 1.0;
                    }
                }
                PlayType::Punt => {}
            }
        }
        box_score.fill_rates();
        box_score
    }

    /// Mean over many games. Rates are recomputed from the mean counts rather
    /// than averaged.
    pub fn mean<'a, I>(scores: I) -> Self
    where
        I: IntoIterator<Item = &'a TeamBoxScore>,
    {
        let mut total = TeamBoxScore::default();
        let mut n = 0usize;
        for s in scores {
            n += 1;
            total.score += s.score;
            total.plays += s.plays;
            total.pass_attempts += s.pass_attempts;
            total.completions += s.completions;
            total.pass_yards += s.pass_yards;
            total.passing_tds += s.passing_tds;
            total.sacks_allowed += s.sacks_allowed;
            total.rushing_attempts += s.rushing_attempts;
            total.rushing_yards += s.rushing_yards;
            total.rushing_tds += s.rushing_tds;
            total.total_turnovers += s.total_turnovers;
            total.field_goal_attempts += s.field_goal_attempts;
            total.field_goals_made += s.field_goals_made;
        }
        if n == 0 {
            return total;
        }

        let n = n as f64;
        let mut mean = TeamBoxScore {
            score: total.score / n,
            plays: total.plays / n,
            pass_attempts: total.pass_attempts / n,
            completions: total.completions / n,
            pass_yards: total.pass_yards / n,
            passing_tds: total.passing_tds / n,
            sacks_allowed: total.sacks_allowed / n,
            rushing_attempts: total.rushing_attempts / n,
            rushing_yards: total.rushing_yards / n,
            rushing_tds: total.rushing_tds / n,
            total_turnovers: total.total_turnovers / n,
            field_goal_attempts: total.field_goal_attempts / n,
            field_goals_made: total.field_goals_made / n,
            ..Default::default()
        };
        mean.fill_rates();
        mean
    }

    fn fill_rates(&mut self) {
        let scrimmage = self.rushing_attempts + self.pass_attempts;
        self.run_rate = percent(self.rushing_attempts, scrimmage);
        self.pass_rate = percent(self.pass_attempts, scrimmage);
        self.pass_cmp_rate = percent(self.completions, self.pass_attempts);
        self.pass_yards_per_play = per(self.pass_yards, self.pass_attempts);
        self.rush_yards_per_play = per(self.rushing_yards, self.rushing_attempts);
        self.fg_pct = percent(self.field_goals_made, self.field_goal_attempts);
    }
}

/// Result of one simulated game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub home_team: String,
    pub away_team: String,
    pub final_score: Score,
    pub play_count: usize,
    /// Empty once the summary has been compacted for aggregation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub play_log: Vec<PlayOutcome>,
    pub home: TeamBoxScore,
    pub away: TeamBoxScore,
}

impl GameSummary {
    pub fn from_play_log(
        home_team: &str,
        away_team: &str,
        final_score: Score,
        play_log: Vec<PlayOutcome>,
    ) -> Self {
        GameSummary {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home: TeamBoxScore::from_plays(Side::Home, final_score.home, &play_log),
            away: TeamBoxScore::from_plays(Side::Away, final_score.away, &play_log),
            final_score,
            play_count: play_log.len(),
            play_log,
        }
    }

    /// `None` on a tie.
    pub fn winner(&self) -> Option<Side> {
        match self.final_score.home.cmp(&self.final_score.away) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Home minus away.
    pub fn score_differential(&self) -> i32 {
        self.final_score.differential(Side::Home)
    }

    pub fn total_score(&self) -> u32 {
        self.final_score.total()
    }

    /// Drop the play log, keeping the play count and box scores.
    pub(crate) fn compact(mut self) -> Self {
        self.play_log = Vec::new();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Seconds of game time elapsed
    pub game_time: u32,
    pub value: f64,
}

impl SeriesPoint {
    fn origin() -> Self {
        SeriesPoint {
            game_time: 0,
            value: 0.0,
        }
    }
}

/// Cumulative per-team series over elapsed game time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamSeries {
    pub pass_yards: Vec<SeriesPoint>,
    pub rush_yards: Vec<SeriesPoint>,
    pub score: Vec<SeriesPoint>,
}

impl Default for TeamSeries {
    fn default() -> Self {
        TeamSeries {
            pass_yards: vec![SeriesPoint::origin()],
            rush_yards: vec![SeriesPoint::origin()],
            score: vec![SeriesPoint::origin()],
        }
    }
}

impl TeamSeries {
    fn push(series: &mut Vec<SeriesPoint>, game_time: u32, delta: f64) {
        let last = series.last().map_or(0.0, |p| p.value);
        series.push(SeriesPoint {
            game_time,
            value: last + delta,
        });
    }
}

/// One game picked out of a batch for a detailed breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeaturedGame {
    /// Index of the game within its batch
    pub index: usize,
    pub summary: GameSummary,
    pub home: TeamSeries,
    pub away: TeamSeries,
}

impl FeaturedGame {
    pub fn from_summary(index: usize, summary: GameSummary) -> Self {
        let mut home = TeamSeries::default();
        let mut away = TeamSeries::default();

        for play in &summary.play_log {
            let t = play.game_time_elapsed();
            let (offense, defense) = match play.offense {
                Side::Home => (&mut home, &mut away),
                Side::Away => (&mut away, &mut home),
            };
            match play.play_type {
                PlayType::Pass => TeamSeries::push(&mut offense.pass_yards, t, play.yards_gained),
                PlayType::Run => TeamSeries::push(&mut offense.rush_yards, t, play.yards_gained),
                _ => {}
            }
            if play.touchdown {
                TeamSeries::push(&mut offense.score, t, TOUCHDOWN_POINTS as f64);
            } else if play.field_goal_made == Some(true) {
                TeamSeries::push(&mut offense.score, t, FIELD_GOAL_POINTS as f64);
            } else if play.safety {
                TeamSeries::push(&mut defense.score, t, SAFETY_POINTS as f64);
            }
        }

        FeaturedGame {
            index,
            summary,
            home,
            away,
        }
    }
}
