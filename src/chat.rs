//! Chat turns over a shared responder and conversation store.
//!
//! One turn: snapshot the session's history, answer the question against
//! that history, then record the user turn and the assistant turn, in that
//! order. The history passed to the responder never contains the question
//! being answered.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use school_counselor_core::{
    Answer, ConversationStore, Responder, ScopeClassifier, ScopeRules, TurnRole,
};

use crate::completion::create_completer;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::index_cmd::open_index;
use crate::sqlite_store::SqliteStore;

/// Canned questions behind the quick-action buttons.
pub const QUICK_ACTIONS: &[(&str, &str)] = &[
    (
        "graduation_requirements",
        "What are the graduation requirements at Green Level High School?",
    ),
    (
        "course_planning",
        "Help me plan my courses for next year. What should I consider?",
    ),
    (
        "college_prep",
        "What are some college preparation tips? Tell me about AP vs Honors courses.",
    ),
    (
        "meet_counselor",
        "Who are the counselors at Green Level and how can I contact them?",
    ),
];

/// Question for a quick-action name (case-insensitive).
pub fn quick_action_question(action: &str) -> Option<&'static str> {
    let action = action.trim().to_lowercase();
    QUICK_ACTIONS
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, question)| *question)
}

#[derive(Clone)]
pub struct ChatService {
    responder: Arc<Responder>,
    sessions: Arc<ConversationStore>,
}

impl ChatService {
    pub fn new(responder: Arc<Responder>, sessions: Arc<ConversationStore>) -> Self {
        Self {
            responder,
            sessions,
        }
    }

    /// Wire providers, the persisted index and the responder from config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;

        let store = SqliteStore::open(&config.index.path).await?;
        let (index, origin) = open_index(config, &store, embedder.as_ref(), false).await?;
        store.close().await;
        info!(chunks = index.len(), ?origin, "vector index ready");

        let rules = ScopeRules::default().with_aliases(&config.school.aliases);
        let responder = Responder::new(Arc::new(index), embedder, completer)
            .with_classifier(ScopeClassifier::new(rules))
            .with_links(config.links.clone().normalized())
            .with_school(&config.school.name, &config.school.crisis_contacts)
            .with_top_k(config.retrieval.top_k);

        Ok(Self::new(
            Arc::new(responder),
            Arc::new(ConversationStore::new()),
        ))
    }

    /// Answer one message and record both turns.
    ///
    /// A blank message gets the prompt-for-input text and is not recorded.
    pub async fn handle(&self, session_id: &str, message: &str) -> Answer {
        let history = self.sessions.get_or_create(session_id);
        let answer = self.responder.answer(message, &history).await;
        debug!(
            session_id,
            history = history.len(),
            decision = ?answer.decision,
            retrieved = answer.retrieved,
            "answered turn"
        );

        if answer.decision.is_some() {
            self.sessions
                .append(session_id, TurnRole::User, message.trim());
            self.sessions
                .append(session_id, TurnRole::Assistant, answer.text.as_str());
        }
        answer
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn sessions(&self) -> &Arc<ConversationStore> {
        &self.sessions
    }
}
