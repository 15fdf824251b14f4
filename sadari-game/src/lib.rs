//! Sadari Game Core
//!
//! Platform-agnostic logic for the Sadari mini-games: seeded ladder draws
//! (amidakuji), shareable ladder configs, and best-score leaderboards.
//! Storage, identifiers, and time are injected so the services run the same
//! against the in-memory store and any external key-value backend.

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod ladder;
pub mod leaderboard;
pub mod limits;
pub mod numbers;
pub mod rng;
pub mod service;
pub mod settings;
pub mod share;
pub mod store;

// Re-export commonly used types
pub use admin::{authorize, bearer_token};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FieldIssue, LadderConfig, ValidationError};
pub use error::ServiceError;
pub use ladder::{
    Assignment, DrawParams, Ladder, Mapping, Move, PathStep, Rung, RungViolation, assignments,
    check_rungs, compute_mapping, generate_ladder, generate_with, is_permutation, walk_ladder,
};
pub use leaderboard::{GameKey, LeaderboardEntry, ScoreOrder, UnknownGame};
pub use limits::{RateDecision, deduplicate, rate_limit};
pub use rng::{DrawSource, Mulberry32};
pub use service::{Arcade, SavedLadder, SubmitOutcome, SubmitRequest};
pub use settings::{ArcadeSettings, SettingsError};
pub use share::{IdAllocator, TokenIdAllocator, share_url};
pub use store::{KvStore, MemoryStore, StoreError};
