use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session file name in the state directory
const SESSION_FILE: &str = "session.json";

/// Persisted key holding the authenticated flag ("true")
pub const KEY_AUTHENTICATED: &str = "authenticated";
/// Persisted key holding the issue time in epoch milliseconds
pub const KEY_TIMESTAMP: &str = "auth_timestamp";
/// Persisted key holding the display name
pub const KEY_USERNAME: &str = "username";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Corrupt session record: {0}")]
    Corrupt(String),
}

/// Proof of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub issued_at: DateTime<Utc>,
    pub display_name: String,
}

impl Session {
    pub(crate) fn issue(display_name: &str) -> Self {
        // Millisecond precision, matching what the persisted record can hold
        let now = Utc::now();
        let issued_at = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        Self {
            authenticated: true,
            issued_at,
            display_name: display_name.to_string(),
        }
    }

    fn to_record(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_AUTHENTICATED.to_string(), self.authenticated.to_string()),
            (
                KEY_TIMESTAMP.to_string(),
                self.issued_at.timestamp_millis().to_string(),
            ),
            (KEY_USERNAME.to_string(), self.display_name.clone()),
        ])
    }

    /// Rebuild a session from its persisted keys.
    ///
    /// Returns `Ok(None)` when the record is not authenticated and an error
    /// when it claims authentication without a timestamp and name.
    fn from_record(record: &BTreeMap<String, String>) -> Result<Option<Self>, SessionError> {
        if record.get(KEY_AUTHENTICATED).map(String::as_str) != Some("true") {
            return Ok(None);
        }

        let millis: i64 = record
            .get(KEY_TIMESTAMP)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SessionError::Corrupt(format!("missing {}", KEY_TIMESTAMP)))?
            .parse()
            .map_err(|_| SessionError::Corrupt(format!("unparseable {}", KEY_TIMESTAMP)))?;
        let issued_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SessionError::Corrupt(format!("out of range {}", KEY_TIMESTAMP)))?;

        let display_name = record
            .get(KEY_USERNAME)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SessionError::Corrupt(format!("missing {}", KEY_USERNAME)))?
            .clone();

        Ok(Some(Self {
            authenticated: true,
            issued_at,
            display_name,
        }))
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.issued_at).num_minutes()
    }

    /// Human-readable time since sign-in, for the title bar.
    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Owner of the persisted session record.
///
/// Only the login gate creates a session and only the sign-out action
/// clears it. Everything else reads through [`SessionView`].
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Open the store in `state_dir`, loading any persisted session.
    ///
    /// A record that violates the session invariant is discarded.
    pub fn open(state_dir: impl AsRef<Path>) -> Self {
        let path = state_dir.as_ref().join(SESSION_FILE);
        let current = match Self::load(&path) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding persisted session");
                if let Err(e) = remove_if_present(&path) {
                    warn!(error = %e, "Failed to remove corrupt session file");
                }
                None
            }
        };
        debug!(authenticated = current.is_some(), "Session store opened");

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    fn load(path: &Path) -> Result<Option<Session>, SessionError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let record: BTreeMap<String, String> = serde_json::from_str(&contents)
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;
        Session::from_record(&record)
    }

    /// The current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current()
            .map(|s| s.authenticated)
            .unwrap_or(false)
    }

    /// Persist a freshly issued session. Called by the login gate only.
    pub(crate) fn establish(&self, session: Session) -> Result<(), SessionError> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // All three keys land in one rename
        let contents = serde_json::to_string_pretty(&session.to_record())?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;

        info!(user = %session.display_name, "Session established");
        *current = Some(session);
        Ok(())
    }

    /// Sign out: drop the in-memory session and remove every persisted key.
    pub fn clear(&self) -> Result<(), SessionError> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // The record goes first; a failed delete leaves the user signed in
        remove_if_present(&self.path)?;
        *current = None;
        info!("Session cleared");
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read-only handle on the session store, handed to modules.
#[derive(Clone)]
pub struct SessionView(Arc<SessionStore>);

impl SessionView {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self(store)
    }

    pub fn current(&self) -> Option<Session> {
        self.0.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_authenticated()
    }
}
