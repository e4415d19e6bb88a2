//! Checkout Session
//!
//! Per-visitor state carried between the pre-checkout hook, the price
//! display and discount validation. The only value tracked is the visitor's
//! country, cleared once checkout completes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{PricingError, Result};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the visitor's country stands for this session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "country", rename_all = "snake_case")]
pub enum LocationState {
    /// No lookup has been kept yet
    #[default]
    Unresolved,

    /// ISO 3166-1 alpha-2 code
    Resolved(String),

    /// A lookup failed and the failure was remembered
    Unknown,
}

/// A visitor's checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,

    pub location: LocationState,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            location: LocationState::Unresolved,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Cached country, if one was resolved
    pub fn country(&self) -> Option<&str> {
        match &self.location {
            LocationState::Resolved(country) => Some(country),
            _ => None,
        }
    }

    pub fn set_country(&mut self, country: impl Into<String>) {
        self.location = LocationState::Resolved(country.into());
        self.touch();
    }

    pub fn mark_unknown(&mut self) {
        self.location = LocationState::Unknown;
        self.touch();
    }

    /// Forget the country (after checkout)
    pub fn clear_location(&mut self) {
        self.location = LocationState::Unresolved;
        self.touch();
    }
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &CheckoutSession) -> Result<()>;

    fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>>;

    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Drop sessions not updated within `max_idle`; returns how many went
    fn purge_idle(&self, max_idle: std::time::Duration) -> Result<usize>;

    /// Load a session or start a fresh one under the same id
    fn load_or_create(&self, id: &SessionId) -> Result<CheckoutSession> {
        Ok(self
            .load(id)?
            .unwrap_or_else(|| CheckoutSession::with_id(id.clone())))
    }
}

/// In-memory session store
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, CheckoutSession>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> PricingError {
    PricingError::Config("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &CheckoutSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }

    fn purge_idle(&self, max_idle: std::time::Duration) -> Result<usize> {
        let max_idle = Duration::from_std(max_idle)
            .map_err(|e| PricingError::Config(format!("session idle limit: {e}")))?;
        let cutoff = Utc::now() - max_idle;

        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, session| session.updated_at >= cutoff);
        Ok(before - sessions.len())
    }
}
