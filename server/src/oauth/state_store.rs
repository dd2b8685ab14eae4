use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use uuid::Uuid;

/// How long an issued state may sit unconsumed before it is evicted.
/// Logins take seconds, so this is generous; the cap exists so abandoned
/// logins cannot grow the table without bound.
const STATE_TTL: Duration = Duration::from_secs(15 * 60);

/// Entropy of the per-login secret, before encoding.
const SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Unknown id, or one that was already consumed. A replayed callback is
    /// indistinguishable from a forged one.
    #[error("state not found or already consumed")]
    NotFound,
    #[error("state secret mismatch")]
    Mismatch,
    /// The callback's state value was not in the `id:secret` shape.
    #[error("malformed state parameter")]
    Malformed,
}

struct PendingState {
    secret: String,
    created_at: Instant,
}

/// In-memory table of in-flight login attempts.
///
/// Each attempt is keyed by a public identifier and bound to a private
/// secret. The split keeps lookup a plain map access while the secret alone
/// goes through the constant-time comparison.
pub struct StateStore {
    pending: Mutex<HashMap<Uuid, PendingState>>,
    ttl: Duration,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a fresh state for a login attempt: a v4 UUID identifier plus an
    /// independent 32-byte random secret, URL-safe encoded.
    ///
    /// Expired entries are pruned here rather than by a background sweep;
    /// delete-on-consume already bounds the table to in-flight logins.
    pub fn issue(&self) -> (Uuid, String) {
        let state_id = Uuid::new_v4();

        let mut secret_bytes = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret_bytes);
        let secret = Base64UrlUnpadded::encode_string(&secret_bytes);

        let mut pending = self.pending.lock().expect("pending state lock poisoned");
        pending.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        pending.insert(
            state_id,
            PendingState {
                secret: secret.clone(),
                created_at: Instant::now(),
            },
        );

        (state_id, secret)
    }

    /// Validate a callback's state and consume it.
    ///
    /// The entry is removed whether or not the secret matches, so a state is
    /// good for exactly one validation attempt and replay is impossible.
    pub fn consume(&self, state_id: Uuid, secret: &str) -> Result<(), StateError> {
        let entry = self
            .pending
            .lock()
            .expect("pending state lock poisoned")
            .remove(&state_id)
            .ok_or(StateError::NotFound)?;

        if constant_time_eq(entry.secret.as_bytes(), secret.as_bytes()) {
            Ok(())
        } else {
            Err(StateError::Mismatch)
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.lock().expect("pending state lock poisoned").len()
    }
}

/// Split the composite `"{state_id}:{secret}"` value the provider echoes
/// back. Any shape violation is reported as `Malformed`.
pub fn parse_state_param(raw: &str) -> Result<(Uuid, &str), StateError> {
    let (id, secret) = raw.split_once(':').ok_or(StateError::Malformed)?;
    let state_id = Uuid::parse_str(id).map_err(|_| StateError::Malformed)?;
    if secret.is_empty() {
        return Err(StateError::Malformed);
    }
    Ok((state_id, secret))
}

/// Comparison that does not short-circuit on the first differing byte.
/// Length is public (all secrets are the same encoded size), only the
/// contents are sensitive.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}
