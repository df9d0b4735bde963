/// Seconds in a regulation quarter
pub const QUARTER_SECONDS: u32 = 900;

/// Regulation quarters in a game
pub const QUARTERS: u8 = 4;

/// Seconds in a regulation game
pub const GAME_SECONDS: u32 = QUARTER_SECONDS * QUARTERS as u32;

/// Yardline after a kickoff (offense on its own 25)
pub const KICKOFF_YARDLINE: f64 = 75.0;

/// Yardline after a touchback on a punt (receiver on its own 20)
pub const TOUCHBACK_YARDLINE: f64 = 80.0;

/// Yards needed for a new set of downs
pub const FIRST_DOWN_DISTANCE: f64 = 10.0;

pub const TOUCHDOWN_POINTS: u32 = 7;
pub const FIELD_GOAL_POINTS: u32 = 3;
pub const SAFETY_POINTS: u32 = 2;

/// Beyond this yardline the fourth-down heuristic punts instead of kicking
pub const PUNT_YARDLINE_THRESHOLD: f64 = 55.0;

/// Tolerance for `run_rate + pass_rate == 1` on incoming statistics
pub const RATE_SUM_TOLERANCE: f64 = 1e-3;
