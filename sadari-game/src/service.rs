//! Save/load for shared ladders and the mini-game leaderboards.
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::admin::authorize;
use crate::clock::{Clock, SystemClock};
use crate::config::{LadderConfig, ValidationError};
use crate::error::ServiceError;
use crate::leaderboard::{
    GameKey, LeaderboardEntry, clamp_limit, is_valid_run_token, parse_score, rank, sanitize_name,
};
use crate::limits::{deduplicate, rate_limit};
use crate::settings::ArcadeSettings;
use crate::share::{IdAllocator, TokenIdAllocator, is_well_formed_id, share_url};
use crate::store::{KvStore, MemoryStore, StoreError};

const SAVE_SCOPE: &str = "ladder:save";
const SUBMIT_SCOPE: &str = "submit";
/// Fresh ids tried before a save gives up on a crowded keyspace.
const ID_ATTEMPTS: usize = 3;

fn config_key(id: &str) -> String {
    format!("ladder:cfg:{id}")
}

fn save_run_key(token: &str) -> String {
    format!("ladder:run:{token}")
}

fn parse_game(name: &str) -> Result<GameKey, ServiceError> {
    name.parse()
        .map_err(|_| ServiceError::invalid("game", "expected \"reaction\" or \"aim\""))
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|err| ValidationError::single("payload", err.to_string()).into())
}

fn store_failure(err: StoreError) -> ServiceError {
    error!("store failure: {err}");
    err.into()
}

/// Where a saved ladder can be found again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLadder {
    pub id: String,
    pub url: String,
}

/// Result of a score submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// False when the name already held an equal or better score.
    pub updated: bool,
}

/// Score submission as sent by a game client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitRequest {
    pub game: Option<String>,
    pub name: Option<String>,
    pub score: Value,
    pub run_id: Option<String>,
}

/// Arcade backend: shared ladders plus per-game best scores.
///
/// Every capability is injected, so the same logic runs against the
/// in-memory store in tests and the CLI server.
pub struct Arcade {
    store: Arc<dyn KvStore>,
    ids: Arc<dyn IdAllocator>,
    clock: Arc<dyn Clock>,
    settings: ArcadeSettings,
}

impl std::fmt::Debug for Arcade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arcade")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Arcade {
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        ids: Arc<dyn IdAllocator>,
        clock: Arc<dyn Clock>,
        settings: ArcadeSettings,
    ) -> Self {
        Self {
            store,
            ids,
            clock,
            settings,
        }
    }

    /// Process-local arcade on the system clock.
    #[must_use]
    pub fn in_memory(settings: ArcadeSettings) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(
            Arc::new(MemoryStore::new(clock.clone())),
            Arc::new(TokenIdAllocator::default()),
            clock,
            settings,
        )
    }

    #[must_use]
    pub const fn settings(&self) -> &ArcadeSettings {
        &self.settings
    }

    async fn admit(&self, scope: &str, client: &str, limit: u32) -> Result<(), ServiceError> {
        let decision = rate_limit(
            self.store.as_ref(),
            scope,
            client,
            limit,
            self.settings.rate_window(),
        )
        .await
        .map_err(store_failure)?;
        if decision.allowed {
            Ok(())
        } else {
            warn!("rate limited {scope} for {client}");
            Err(ServiceError::RateLimited {
                retry_after: decision.retry_after,
            })
        }
    }

    /// Persist a ladder config and hand back its share link.
    ///
    /// # Errors
    ///
    /// `RateLimited` past the per-client save budget, `InvalidPayload` for a
    /// malformed body, `DuplicateSubmission` when `runId` was already used
    /// inside the dedup window, and `StorageUnavailable` on store failure.
    pub async fn save_ladder(
        &self,
        payload: &Value,
        client: &str,
    ) -> Result<SavedLadder, ServiceError> {
        self.admit(SAVE_SCOPE, client, self.settings.save_rate_limit)
            .await?;
        self.store_ladder(payload).await
    }

    /// [`Arcade::save_ladder`] for an undecoded request body. The request
    /// counts against the save budget even when the body is not JSON.
    ///
    /// # Errors
    ///
    /// As [`Arcade::save_ladder`].
    pub async fn save_ladder_body(
        &self,
        body: &[u8],
        client: &str,
    ) -> Result<SavedLadder, ServiceError> {
        self.admit(SAVE_SCOPE, client, self.settings.save_rate_limit)
            .await?;
        let payload: Value = decode_body(body)?;
        self.store_ladder(&payload).await
    }

    async fn store_ladder(&self, payload: &Value) -> Result<SavedLadder, ServiceError> {
        let config = LadderConfig::from_payload(payload, self.clock.now_millis())?;
        let run_token = match payload.get("runId") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) if token.is_empty() => None,
            Some(Value::String(token)) => Some(token.as_str()),
            Some(_) => return Err(ServiceError::invalid("runId", "expected a string")),
        };
        if let Some(token) = run_token {
            let first = deduplicate(
                self.store.as_ref(),
                &save_run_key(token),
                "1",
                self.settings.dedup_window(),
            )
            .await
            .map_err(store_failure)?;
            if !first {
                debug!("duplicate ladder save for run {token}");
                return Err(ServiceError::DuplicateSubmission);
            }
        }

        let json = config
            .to_json()
            .map_err(|err| ServiceError::StorageUnavailable(err.to_string()))?;
        let id = self.claim_id(&json, config.created_at).await?;
        info!(
            "saved ladder {id} ({} lanes, {} rungs)",
            config.cols(),
            config.rungs.len()
        );
        let url = share_url(self.settings.site_url.as_deref(), &id);
        Ok(SavedLadder { id, url })
    }

    /// Write `json` under a newly allocated id without touching existing records.
    async fn claim_id(&self, json: &str, created_at: i64) -> Result<String, ServiceError> {
        for _ in 0..ID_ATTEMPTS {
            let id = self.ids.allocate(created_at);
            let fresh = self
                .store
                .set_if_absent(
                    &config_key(&id),
                    json.to_string(),
                    Some(self.settings.ladder_ttl()),
                )
                .await
                .map_err(store_failure)?;
            if fresh {
                return Ok(id);
            }
            warn!("ladder id {id} is taken, allocating another");
        }
        error!("no free ladder id after {ID_ATTEMPTS} attempts");
        Err(ServiceError::StorageUnavailable(
            "could not allocate a ladder id".to_string(),
        ))
    }

    /// Fetch a saved ladder.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` for a blank id, `NotFound` for an unknown or expired
    /// id, and `StorageUnavailable` when the store fails or holds a record
    /// that no longer decodes.
    pub async fn load_ladder(&self, id: &str) -> Result<LadderConfig, ServiceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ServiceError::invalid("id", "must not be blank"));
        }
        if !is_well_formed_id(id) {
            debug!("rejecting malformed ladder id {id:?}");
            return Err(ServiceError::NotFound);
        }
        let stored = self
            .store
            .get(&config_key(id))
            .await
            .map_err(store_failure)?
            .ok_or(ServiceError::NotFound)?;
        LadderConfig::from_json(&stored).map_err(|err| {
            error!("stored ladder {id} is unreadable: {err}");
            ServiceError::StorageUnavailable(format!("stored ladder {id} is unreadable"))
        })
    }

    /// Record a finished run, keeping only each name's best score.
    ///
    /// # Errors
    ///
    /// `RateLimited`, `InvalidPayload` for an unknown game, short run token,
    /// blank name, or unusable score, `DuplicateSubmission` for a replayed
    /// run token, and `StorageUnavailable` on store failure.
    pub async fn submit_score(
        &self,
        request: &SubmitRequest,
        client: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.admit(SUBMIT_SCOPE, client, self.settings.submit_rate_limit)
            .await?;
        self.record_score(request, client).await
    }

    /// [`Arcade::submit_score`] for an undecoded request body. The request
    /// counts against the submit budget even when the body is not JSON.
    ///
    /// # Errors
    ///
    /// As [`Arcade::submit_score`].
    pub async fn submit_score_body(
        &self,
        body: &[u8],
        client: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.admit(SUBMIT_SCOPE, client, self.settings.submit_rate_limit)
            .await?;
        let request: SubmitRequest = decode_body(body)?;
        self.record_score(&request, client).await
    }

    async fn record_score(
        &self,
        request: &SubmitRequest,
        client: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        let game = parse_game(request.game.as_deref().unwrap_or_default())?;
        let run_token = request
            .run_id
            .as_deref()
            .filter(|token| is_valid_run_token(token))
            .ok_or_else(|| ServiceError::invalid("runId", "must be at least 8 characters"))?;
        let name = sanitize_name(request.name.as_deref().unwrap_or_default());
        if name.is_empty() {
            return Err(ServiceError::invalid("name", "must not be blank"));
        }
        let score = parse_score(&request.score).ok_or_else(|| {
            ServiceError::invalid("score", "expected a finite, non-negative number")
        })?;

        let first = deduplicate(
            self.store.as_ref(),
            &game.run_key(run_token),
            client,
            self.settings.dedup_window(),
        )
        .await
        .map_err(store_failure)?;
        if !first {
            debug!("duplicate {game} submission for run {run_token}");
            return Err(ServiceError::DuplicateSubmission);
        }

        let board = game.board_key();
        let current = self
            .store
            .score(&board, &name)
            .await
            .map_err(store_failure)?;
        let updated = current.is_none_or(|best| game.order().improves(score, best));
        if updated {
            self.store
                .put_score(&board, &name, score)
                .await
                .map_err(store_failure)?;
            debug!("{game} best for {name} is now {score}");
        }
        Ok(SubmitOutcome { updated })
    }

    /// Best scores for `game`, best first.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` for an unknown game and `StorageUnavailable` on store
    /// failure.
    pub async fn leaderboard(
        &self,
        game: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let game = parse_game(game)?;
        let entries = self
            .store
            .scores(&game.board_key())
            .await
            .map_err(store_failure)?
            .into_iter()
            .map(|(name, score)| LeaderboardEntry { name, score })
            .collect();
        Ok(rank(entries, game.order(), clamp_limit(limit)))
    }

    /// Clear one board, or every board when `game` is `None`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `bearer` matches the configured admin token,
    /// `InvalidPayload` for an unknown game, and `StorageUnavailable` on
    /// store failure.
    pub async fn reset(
        &self,
        bearer: Option<&str>,
        game: Option<&str>,
    ) -> Result<(), ServiceError> {
        if !authorize(self.settings.admin_token.as_deref(), bearer) {
            warn!("refused admin reset");
            return Err(ServiceError::Unauthorized);
        }
        let games = match game {
            Some(name) => vec![parse_game(name)?],
            None => GameKey::ALL.to_vec(),
        };
        for game in games {
            self.store
                .del(&game.board_key())
                .await
                .map_err(store_failure)?;
            info!("cleared {game} leaderboard");
        }
        Ok(())
    }
}
