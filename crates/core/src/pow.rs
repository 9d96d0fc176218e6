//! Proof-of-work nonce search.
//!
//! A hash satisfies difficulty `d` when its lowercase hex rendering starts
//! with `d` `'0'` characters. The search always looks for the lowest nonce at
//! or above the starting nonce, both in sequential and in parallel mode, so
//! the two modes agree on the result.

use crate::hash::Hash;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Difficulty is counted in hex digits, and a SHA-256 digest has 64 of them.
pub const MAX_DIFFICULTY: u32 = 64;

/// Errors that can stop a nonce search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("difficulty {0} exceeds the maximum of {MAX_DIFFICULTY}")]
    DifficultyTooHigh(u32),

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no valid nonce found within {attempts} attempts")]
    AttemptsExhausted { attempts: u64 },

    #[error("failed to start mining threads: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, MiningError>;

/// Check the nibble-level difficulty predicate.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    hash.leading_zero_nibbles() >= difficulty
}

/// Shared flag used to stop a running search from another thread.
///
/// Once triggered the token stays cancelled until [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every search holding this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Re-arm the token so later searches run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration for the nonce search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Worker threads. `1` runs the plain sequential loop.
    pub threads: usize,
    /// Nonces handed to the pool per round in parallel mode.
    pub batch_size: u64,
    /// Upper bound on hashes tried before giving up (unbounded if `None`).
    pub max_attempts: Option<u64>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            batch_size: 4096,
            max_attempts: None,
        }
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningOutcome {
    /// The winning nonce.
    pub nonce: u64,
    /// Hash produced by the winning nonce.
    pub hash: Hash,
    /// Nonces covered from the starting nonce up to and including the winner.
    pub attempts: u64,
}

/// Nonce searcher with cooperative cancellation.
#[derive(Debug, Clone, Default)]
pub struct Miner {
    config: MiningConfig,
    cancel: CancelToken,
}

impl Miner {
    /// Create a miner with its own cancel token.
    pub fn new(config: MiningConfig) -> Self {
        Self::with_cancel_token(config, CancelToken::new())
    }

    /// Create a miner that stops when `cancel` is triggered.
    pub fn with_cancel_token(config: MiningConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// A handle that cancels this miner's searches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Find the lowest nonce `>= start` whose `hash_at(nonce)` meets `difficulty`.
    pub fn search<F>(&self, start: u64, difficulty: u32, hash_at: F) -> Result<MiningOutcome>
    where
        F: Fn(u64) -> Hash + Sync,
    {
        if difficulty > MAX_DIFFICULTY {
            return Err(MiningError::DifficultyTooHigh(difficulty));
        }

        let started = Instant::now();
        let result = if self.config.threads > 1 {
            self.search_parallel(start, difficulty, &hash_at)
        } else {
            self.search_sequential(start, difficulty, &hash_at)
        };

        match &result {
            Ok(outcome) => tracing::debug!(
                difficulty,
                nonce = outcome.nonce,
                attempts = outcome.attempts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "nonce found"
            ),
            Err(e) => tracing::debug!(difficulty, error = %e, "nonce search stopped"),
        }

        result
    }

    fn search_sequential<F>(&self, start: u64, difficulty: u32, hash_at: &F) -> Result<MiningOutcome>
    where
        F: Fn(u64) -> Hash,
    {
        let mut nonce = start;
        let mut attempts = 0u64;

        loop {
            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(MiningError::AttemptsExhausted { attempts });
            }
            if self.cancel.is_cancelled() {
                return Err(MiningError::Cancelled { attempts });
            }

            let hash = hash_at(nonce);
            attempts += 1;
            if meets_difficulty(&hash, difficulty) {
                return Ok(MiningOutcome {
                    nonce,
                    hash,
                    attempts,
                });
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(MiningError::AttemptsExhausted { attempts })?;
        }
    }

    fn search_parallel<F>(&self, start: u64, difficulty: u32, hash_at: &F) -> Result<MiningOutcome>
    where
        F: Fn(u64) -> Hash + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| MiningError::ThreadPool(e.to_string()))?;

        pool.install(|| {
            let mut lower = start;
            let mut attempts = 0u64;

            loop {
                if self.cancel.is_cancelled() {
                    return Err(MiningError::Cancelled { attempts });
                }

                let mut span = self.config.batch_size.max(1);
                if let Some(max) = self.config.max_attempts {
                    span = span.min(max.saturating_sub(attempts));
                }
                if span == 0 {
                    return Err(MiningError::AttemptsExhausted { attempts });
                }
                // Inclusive, so the final batch can reach `u64::MAX`.
                let last = lower.saturating_add(span - 1);

                let found = (lower..=last).into_par_iter().find_first(|&nonce| {
                    !self.cancel.is_cancelled() && meets_difficulty(&hash_at(nonce), difficulty)
                });

                // A cancel mid-round may have skipped lower nonces.
                if self.cancel.is_cancelled() {
                    return Err(MiningError::Cancelled { attempts });
                }

                if let Some(nonce) = found {
                    return Ok(MiningOutcome {
                        nonce,
                        hash: hash_at(nonce),
                        attempts: attempts + (nonce - lower) + 1,
                    });
                }

                attempts += last - lower + 1;
                if last == u64::MAX {
                    return Err(MiningError::AttemptsExhausted { attempts });
                }
                lower = last + 1;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn hash_for(prefix: &'static str) -> impl Fn(u64) -> Hash + Sync {
        move |nonce| hash(format!("{prefix}-{nonce}").as_bytes())
    }

    #[test]
    fn test_meets_difficulty() {
        let mut bytes = [0xabu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x0c;
        let h = Hash(bytes);

        assert!(meets_difficulty(&h, 0));
        assert!(meets_difficulty(&h, 3));
        assert!(!meets_difficulty(&h, 4));
        assert!(meets_difficulty(&Hash::ZERO, MAX_DIFFICULTY));
    }

    #[test]
    fn test_sequential_search_finds_valid_nonce() {
        let miner = Miner::default();
        let hash_at = hash_for("seq");
        let outcome = miner.search(0, 2, &hash_at).unwrap();

        assert!(outcome.hash.to_hex().starts_with("00"));
        assert_eq!(outcome.hash, hash_at(outcome.nonce));
        assert_eq!(outcome.attempts, outcome.nonce + 1);
        for nonce in 0..outcome.nonce {
            assert!(!meets_difficulty(&hash_at(nonce), 2));
        }
    }

    #[test]
    fn test_zero_difficulty_takes_start_nonce() {
        let outcome = Miner::default().search(17, 0, hash_for("zero")).unwrap();
        assert_eq!(outcome.nonce, 17);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = Miner::default().search(0, 3, hash_for("par")).unwrap();

        let parallel = Miner::new(MiningConfig {
            threads: 4,
            batch_size: 512,
            max_attempts: None,
        })
        .search(0, 3, hash_for("par"))
        .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_difficulty_too_high() {
        let result = Miner::default().search(0, MAX_DIFFICULTY + 1, hash_for("x"));
        assert_eq!(result, Err(MiningError::DifficultyTooHigh(MAX_DIFFICULTY + 1)));
    }

    #[test]
    fn test_attempt_bound_sequential() {
        let miner = Miner::new(MiningConfig {
            max_attempts: Some(10),
            ..MiningConfig::default()
        });
        let result = miner.search(0, 40, hash_for("bound"));
        assert_eq!(result, Err(MiningError::AttemptsExhausted { attempts: 10 }));
    }

    #[test]
    fn test_attempt_bound_parallel() {
        let miner = Miner::new(MiningConfig {
            threads: 2,
            batch_size: 64,
            max_attempts: Some(200),
        });
        let result = miner.search(0, 40, hash_for("bound"));
        assert_eq!(result, Err(MiningError::AttemptsExhausted { attempts: 200 }));
    }

    #[test]
    fn test_top_of_nonce_range_agrees() {
        // Only the very last nonce wins.
        let hash_at = |nonce: u64| {
            if nonce == u64::MAX {
                Hash::ZERO
            } else {
                Hash([0xff; 32])
            }
        };
        let parallel = Miner::new(MiningConfig {
            threads: 2,
            ..MiningConfig::default()
        });

        let expected = Ok(MiningOutcome {
            nonce: u64::MAX,
            hash: Hash::ZERO,
            attempts: 3,
        });
        assert_eq!(Miner::default().search(u64::MAX - 2, 1, hash_at), expected);
        assert_eq!(parallel.search(u64::MAX - 2, 1, hash_at), expected);
    }

    #[test]
    fn test_exhausted_nonce_range_agrees() {
        let never = |_: u64| Hash([0xff; 32]);
        let parallel = Miner::new(MiningConfig {
            threads: 2,
            ..MiningConfig::default()
        });

        let expected = Err(MiningError::AttemptsExhausted { attempts: 3 });
        assert_eq!(Miner::default().search(u64::MAX - 2, 1, never), expected);
        assert_eq!(parallel.search(u64::MAX - 2, 1, never), expected);
    }

    #[test]
    fn test_cancelled_before_start() {
        let miner = Miner::default();
        miner.cancel_token().cancel();
        let result = miner.search(0, 40, hash_for("cancel"));
        assert_eq!(result, Err(MiningError::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let miner = Miner::new(MiningConfig {
            threads: 2,
            ..MiningConfig::default()
        });
        let token = miner.cancel_token();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            token.cancel();
        });

        // 40 hex zeros is out of reach, so only the cancel can end this.
        let result = miner.search(0, 40, hash_for("cancel"));
        handle.join().unwrap();

        assert!(matches!(result, Err(MiningError::Cancelled { .. })));
    }

    #[test]
    fn test_reset_rearms_token() {
        let miner = Miner::default();
        miner.cancel_token().cancel();
        assert!(miner.search(0, 1, hash_for("reset")).is_err());

        miner.cancel_token().reset();
        assert!(miner.search(0, 1, hash_for("reset")).is_ok());
    }

    #[test]
    fn test_mining_config_defaults_from_json() {
        let config: MiningConfig = serde_json::from_str(r#"{"threads": 8}"#).unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.batch_size, 4096);
        assert_eq!(config.max_attempts, None);
    }
}
