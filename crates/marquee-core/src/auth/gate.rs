//! The login gate: a single-tenant credential check with brute-force lockout.
//!
//! ```text
//!            submit()                  match
//!   Idle ───────────────▶ Authenticating ─────▶ Idle (session written)
//!    ▲                        │ mismatch
//!    │                        ▼
//!    │        failures < N: Idle
//!    │        failures = N: Locked ──(lockout elapses)──▶ Idle, failures = 0
//! ```
//!
//! Submits are serialized: a submit that arrives while another is still
//! authenticating is rejected with [`LoginError::InProgress`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DemoCredentials;

use super::session::{Session, SessionStore};

// ============================================================================
// Constants
// ============================================================================

/// Consecutive failures that trigger a lockout.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// How long a lockout lasts, in milliseconds.
pub const DEFAULT_LOCKOUT_MS: u64 = 30_000;

/// Every evaluated submit takes at least this long, in milliseconds.
pub const DEFAULT_MIN_LATENCY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failures: u32,
    pub lockout: Duration,
    pub min_latency: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            lockout: Duration::from_millis(DEFAULT_LOCKOUT_MS),
            min_latency: Duration::from_millis(DEFAULT_MIN_LATENCY_MS),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid username or password")]
    CredentialMismatch {
        attempts_remaining: u32,
        just_locked: bool,
    },

    #[error("Sign-in locked for {}ms", remaining.as_millis())]
    Locked { remaining: Duration },

    #[error("A sign-in attempt is already in progress")]
    InProgress,

    #[error("Failed to save session: {0}")]
    SessionStore(String),
}

impl LoginError {
    /// Message for the login overlay.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Validation(msg) => msg.clone(),
            LoginError::CredentialMismatch {
                just_locked: true, ..
            } => "Too many failed attempts. Sign-in is temporarily locked.".to_string(),
            LoginError::CredentialMismatch {
                attempts_remaining, ..
            } => format!(
                "Invalid username or password. {} attempt{} remaining.",
                attempts_remaining,
                if *attempts_remaining == 1 { "" } else { "s" }
            ),
            LoginError::Locked { remaining } => format!(
                "Too many failed attempts. Try again in {}s.",
                countdown_secs(*remaining)
            ),
            LoginError::InProgress => "Signing in, please wait...".to_string(),
            LoginError::SessionStore(_) => "Signed in, but the session could not be saved.".to_string(),
        }
    }
}

/// Whole seconds left on a countdown, rounded up so "0s" never shows early.
pub fn countdown_secs(remaining: Duration) -> u64 {
    remaining.as_millis().div_ceil(1000) as u64
}

/// Observable gate phase, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Authenticating,
    Locked { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    pub phase: GatePhase,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Authenticating,
    Locked { until: Instant, generation: u64 },
}

#[derive(Debug)]
struct GateState {
    phase: Phase,
    consecutive_failures: u32,
    /// Bumped on every lock so a stale expiry timer cannot unlock a newer lock
    generation: u64,
}

impl GateState {
    /// Apply a lockout expiry the timer has not delivered yet.
    fn expire_if_due(&mut self, now: Instant) {
        if let Phase::Locked { until, .. } = self.phase {
            if now >= until {
                self.unlock();
            }
        }
    }

    fn unlock(&mut self) {
        self.phase = Phase::Idle;
        self.consecutive_failures = 0;
        info!("Sign-in lockout expired");
    }
}

struct GateInner {
    credentials: DemoCredentials,
    policy: LockoutPolicy,
    sessions: Arc<SessionStore>,
    state: Mutex<GateState>,
}

impl GateInner {
    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Returns the gate to Idle if a submit is dropped mid-evaluation.
struct AuthenticatingGuard(Arc<GateInner>);

impl Drop for AuthenticatingGuard {
    fn drop(&mut self) {
        let mut state = self.0.state();
        if matches!(state.phase, Phase::Authenticating) {
            state.phase = Phase::Idle;
        }
    }
}

/// Login gate. Clone is cheap and clones share state.
#[derive(Clone)]
pub struct LoginGate {
    inner: Arc<GateInner>,
}

impl LoginGate {
    pub fn new(credentials: DemoCredentials, policy: LockoutPolicy, sessions: Arc<SessionStore>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                credentials,
                policy,
                sessions,
                state: Mutex::new(GateState {
                    phase: Phase::Idle,
                    consecutive_failures: 0,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.inner.policy
    }

    pub fn status(&self) -> GateStatus {
        let now = Instant::now();
        let mut state = self.inner.state();
        state.expire_if_due(now);
        let phase = match state.phase {
            Phase::Idle => GatePhase::Idle,
            Phase::Authenticating => GatePhase::Authenticating,
            Phase::Locked { until, .. } => GatePhase::Locked {
                remaining: until.saturating_duration_since(now),
            },
        };
        GateStatus {
            phase,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Evaluate one credential pair.
    ///
    /// On success the session is written and returned. Every evaluated
    /// submit resolves no earlier than the policy's minimum latency;
    /// locked, busy and invalid submits resolve immediately.
    pub async fn submit(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        let started = Instant::now();
        let username = username.trim();

        {
            let mut state = self.inner.state();
            state.expire_if_due(started);
            match state.phase {
                Phase::Locked { until, .. } => {
                    debug!("Submit refused while locked");
                    return Err(LoginError::Locked {
                        remaining: until.saturating_duration_since(started),
                    });
                }
                Phase::Authenticating => return Err(LoginError::InProgress),
                Phase::Idle => {}
            }

            if username.is_empty() || password.is_empty() {
                return Err(LoginError::Validation(
                    "Username and password required".to_string(),
                ));
            }

            state.phase = Phase::Authenticating;
        }
        let _guard = AuthenticatingGuard(self.inner.clone());

        let credentials = &self.inner.credentials;
        let matched = constant_time_eq(username.as_bytes(), credentials.username.as_bytes())
            & constant_time_eq(password.as_bytes(), credentials.password.as_bytes());

        tokio::time::sleep_until(started + self.inner.policy.min_latency).await;

        let mut state = self.inner.state();
        if matched {
            state.consecutive_failures = 0;
            state.phase = Phase::Idle;
            drop(state);

            let session = Session::issue(username);
            self.inner
                .sessions
                .establish(session.clone())
                .map_err(|e| LoginError::SessionStore(e.to_string()))?;
            info!(user = %username, "Login successful");
            return Ok(session);
        }

        state.consecutive_failures += 1;
        let max_failures = self.inner.policy.max_failures;
        if state.consecutive_failures >= max_failures {
            state.generation += 1;
            let generation = state.generation;
            let until = Instant::now() + self.inner.policy.lockout;
            state.phase = Phase::Locked { until, generation };
            drop(state);

            warn!(
                failures = max_failures,
                lockout_ms = self.inner.policy.lockout.as_millis() as u64,
                "Too many failed sign-in attempts, locking"
            );
            self.spawn_unlock_timer(until, generation);

            Err(LoginError::CredentialMismatch {
                attempts_remaining: 0,
                just_locked: true,
            })
        } else {
            state.phase = Phase::Idle;
            let attempts_remaining = max_failures - state.consecutive_failures;
            warn!(failures = state.consecutive_failures, attempts_remaining, "Login failed");
            Err(LoginError::CredentialMismatch {
                attempts_remaining,
                just_locked: false,
            })
        }
    }

    /// Unlock when the lockout elapses, whether or not anyone submits again.
    fn spawn_unlock_timer(&self, until: Instant, generation: u64) {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep_until(until).await;
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state();
                if matches!(state.phase, Phase::Locked { generation: g, .. } if g == generation) {
                    state.unlock();
                }
            }
        });
    }
}

/// Compare two byte strings without an early exit on the first difference
/// or on a length mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= (x ^ y) as usize;
    }
    diff == 0
}
