//! In-process conversation store.
//!
//! Maps a session id to its ordered history and last-access time. The map
//! sits behind one coarse `RwLock`, so requests for different sessions never
//! interfere and the stale sweep is serialized against appends. Concurrent
//! appends to the same session land in lock-acquisition order.
//!
//! Time comes from a [`Clock`] so sweeps can be tested without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::models::{ConversationTurn, TurnRole};

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct Session {
    messages: Vec<ConversationTurn>,
    last_active: DateTime<Utc>,
}

pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Snapshot of the session's history, creating an empty session on
    /// first reference. Bumps `last_active`.
    pub fn get_or_create(&self, session_id: &str) -> Vec<ConversationTurn> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                messages: Vec::new(),
                last_active: now,
            });
        session.last_active = now;
        session.messages.clone()
    }

    /// Append one turn, creating the session if needed. Bumps `last_active`.
    pub fn append(&self, session_id: &str, role: TurnRole, content: impl Into<String>) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                messages: Vec::new(),
                last_active: now,
            });
        session.messages.push(ConversationTurn {
            role,
            content: content.into(),
        });
        session.last_active = now;
    }

    /// Remove every session idle for longer than `timeout`. Returns the
    /// number removed.
    pub fn sweep_stale(&self, timeout: Duration) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_active <= timeout);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
