//! Leaderboard rules for the timed mini-games.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Longest display name kept on a board, in characters.
pub const MAX_NAME_CHARS: usize = 20;
/// Shortest run token accepted.
pub const MIN_RUN_TOKEN_LEN: usize = 8;
pub const DEFAULT_BOARD_LIMIT: usize = 10;
pub const MAX_BOARD_LIMIT: usize = 50;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Which way a score improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    LowerIsBetter,
    HigherIsBetter,
}

impl ScoreOrder {
    /// Orders `a` before `b` when `a` is the better score.
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LowerIsBetter => a.total_cmp(&b),
            Self::HigherIsBetter => b.total_cmp(&a),
        }
    }

    /// Whether `candidate` beats `current`. Ties keep the current score.
    #[must_use]
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        self.compare(candidate, current) == Ordering::Less
    }
}

/// Games that keep a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKey {
    /// Reaction time in milliseconds.
    Reaction,
    /// Targets hit.
    Aim,
}

impl GameKey {
    pub const ALL: [Self; 2] = [Self::Reaction, Self::Aim];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reaction => "reaction",
            Self::Aim => "aim",
        }
    }

    #[must_use]
    pub const fn order(self) -> ScoreOrder {
        match self {
            Self::Reaction => ScoreOrder::LowerIsBetter,
            Self::Aim => ScoreOrder::HigherIsBetter,
        }
    }

    /// Store key of this game's board.
    #[must_use]
    pub fn board_key(self) -> String {
        format!("lb:{}", self.as_str())
    }

    /// Store key that marks `run_token` as already submitted.
    #[must_use]
    pub fn run_key(self, run_token: &str) -> String {
        format!("lb:{}:run:{run_token}", self.as_str())
    }
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown game name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game: {0}")]
pub struct UnknownGame(pub String);

impl FromStr for GameKey {
    type Err = UnknownGame;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "reaction" => Ok(Self::Reaction),
            "aim" => Ok(Self::Aim),
            other => Err(UnknownGame(other.to_string())),
        }
    }
}

/// A name and its best score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: f64,
}

/// Trim, collapse inner whitespace, and cap at [`MAX_NAME_CHARS`] characters.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    WHITESPACE_RUN
        .replace_all(raw.trim(), " ")
        .chars()
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Run tokens are client-minted and only need to be long enough to be unique.
#[must_use]
pub fn is_valid_run_token(token: &str) -> bool {
    token.chars().count() >= MIN_RUN_TOKEN_LEN
}

/// Read a submitted score from a JSON number or numeric string.
/// Only finite, non-negative values qualify.
#[must_use]
pub fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (score.is_finite() && score >= 0.0).then_some(score)
}

/// Clamp a requested board size; absent means [`DEFAULT_BOARD_LIMIT`].
#[must_use]
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_BOARD_LIMIT)
        .clamp(1, MAX_BOARD_LIMIT)
}

/// Best `limit` entries, best first; equal scores fall back to name order.
#[must_use]
pub fn rank(
    mut entries: Vec<LeaderboardEntry>,
    order: ScoreOrder,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        order
            .compare(a.score, b.score)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, score: f64) -> LeaderboardEntry {
        LeaderboardEntry {
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn orders_pick_the_right_winner() {
        assert!(ScoreOrder::LowerIsBetter.improves(180.0, 200.0));
        assert!(!ScoreOrder::LowerIsBetter.improves(200.0, 180.0));
        assert!(ScoreOrder::HigherIsBetter.improves(31.0, 30.0));
        assert!(!ScoreOrder::HigherIsBetter.improves(30.0, 30.0));
    }

    #[test]
    fn game_keys_parse_and_describe_their_boards() {
        assert_eq!("reaction".parse::<GameKey>(), Ok(GameKey::Reaction));
        assert_eq!("aim".parse::<GameKey>(), Ok(GameKey::Aim));
        assert!("snake".parse::<GameKey>().is_err());
        assert_eq!(GameKey::Aim.board_key(), "lb:aim");
        assert_eq!(GameKey::Reaction.run_key("abcdefgh"), "lb:reaction:run:abcdefgh");
        assert_eq!(GameKey::Reaction.order(), ScoreOrder::LowerIsBetter);
    }

    #[test]
    fn names_are_trimmed_collapsed_and_capped() {
        assert_eq!(sanitize_name("  Kim \t  Ji\nHo  "), "Kim Ji Ho");
        assert_eq!(sanitize_name("   "), "");
        assert_eq!(sanitize_name(&"가".repeat(30)).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn scores_must_be_finite_and_non_negative() {
        assert_eq!(parse_score(&json!(212.5)), Some(212.5));
        assert_eq!(parse_score(&json!("18")), Some(18.0));
        assert_eq!(parse_score(&json!(0)), Some(0.0));
        assert_eq!(parse_score(&json!(-1)), None);
        assert_eq!(parse_score(&json!("inf")), None);
        assert_eq!(parse_score(&json!("fast")), None);
        assert_eq!(parse_score(&json!(null)), None);
    }

    #[test]
    fn run_tokens_need_eight_chars() {
        assert!(is_valid_run_token("abcdefgh"));
        assert!(!is_valid_run_token("abc"));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 50);
    }

    #[test]
    fn ranking_follows_game_order_then_name() {
        let entries = vec![entry("b", 200.0), entry("a", 200.0), entry("c", 150.0)];
        let fastest = rank(entries.clone(), ScoreOrder::LowerIsBetter, 10);
        assert_eq!(
            fastest.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["c", "a", "b"]
        );
        let most = rank(entries, ScoreOrder::HigherIsBetter, 2);
        assert_eq!(
            most.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
