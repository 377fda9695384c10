//! Retrieval-augmented responder.
//!
//! ```text
//! START -> empty question            -> prompt-for-input text
//! START -> SafetyOverride            -> counselor referral with contacts
//! START -> Greeting(kind)            -> greeting template for kind
//! START -> OutOfScope                -> redirect text
//! START -> InScope -> retrieve top-k -> assemble -> complete -> link? -> answer
//! ```
//!
//! Only the in-scope path touches the embedder or the completer. Retrieval
//! failures degrade to an empty context; completion failures become a fixed
//! apology. [`Responder::query_with_rag`] never fails.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::classifier::ScopeClassifier;
use crate::completion::Completer;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::links::{append_link, Link, LinkRules};
use crate::models::{Chunk, ConversationTurn, GreetingKind, ScopeDecision};
use crate::prompt::assemble_messages;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Contacts listed in the safety referral when none are configured.
pub fn default_crisis_contacts() -> Vec<String> {
    vec![
        "your school counselor or any trusted adult at school".to_string(),
        "the 988 Suicide & Crisis Lifeline (call or text 988)".to_string(),
        "the Crisis Text Line (text HOME to 741741)".to_string(),
        "911 if you are in immediate danger".to_string(),
    ]
}

/// Fixed response texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplates {
    pub empty_question: String,
    pub greeting_default: String,
    pub greeting_how_are_you: String,
    pub greeting_whats_up: String,
    pub redirect: String,
    pub safety_referral: String,
    pub apology: String,
}

impl ResponseTemplates {
    pub fn for_school(school: &str, crisis_contacts: &[String]) -> Self {
        let topics = "courses, graduation requirements, college preparation, scheduling, and academic planning";
        let contacts = crisis_contacts
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            empty_question: format!("I'm here to help! Please ask me a question about {school}."),
            greeting_default: format!(
                "Hello! I'm the {school} AI counselor. I can help you with questions about {topics}. How can I assist you today?"
            ),
            greeting_how_are_you: format!(
                "I'm doing great, thank you for asking! I'm here to help you with questions about {school}: {topics}. What can I help you with today?"
            ),
            greeting_whats_up: format!(
                "Not much! I'm here to help with anything related to {school}: {topics}. What's on your mind?"
            ),
            redirect: format!(
                "I'm designed to help with questions about {school}, including {topics}. \
I'm not able to answer questions outside of these topics. Is there something school-related I can help you with instead?"
            ),
            safety_referral: format!(
                "It sounds like you may be going through something really difficult, and you deserve support right now. \
I'm not able to help with this, but people who can are available:\n{contacts}\n\
Please reach out to one of them. You don't have to handle this alone."
            ),
            apology: format!(
                "I encountered an error while processing your question. \
Please try rephrasing your question or ask about something else. I'm here to help with {school} topics!"
            ),
        }
    }

    pub fn greeting(&self, kind: GreetingKind) -> &str {
        match kind {
            GreetingKind::HowAreYou => &self.greeting_how_are_you,
            GreetingKind::WhatsUp => &self.greeting_whats_up,
            GreetingKind::Default => &self.greeting_default,
        }
    }
}

/// Result of one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// `None` for an empty question, which is never classified.
    pub decision: Option<ScopeDecision>,
    /// Chunks retrieved on the in-scope path.
    pub retrieved: usize,
    pub link: Option<Link>,
}

impl Answer {
    fn fixed(text: &str, decision: Option<ScopeDecision>) -> Self {
        Self {
            text: text.to_string(),
            decision,
            retrieved: 0,
            link: None,
        }
    }
}

pub struct Responder {
    classifier: ScopeClassifier,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    links: LinkRules,
    school_name: String,
    templates: ResponseTemplates,
    top_k: usize,
}

impl Responder {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        let school_name = "the school".to_string();
        Self {
            classifier: ScopeClassifier::default(),
            index,
            embedder,
            completer,
            links: LinkRules::default(),
            templates: ResponseTemplates::for_school(&school_name, &default_crisis_contacts()),
            school_name,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_classifier(mut self, classifier: ScopeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_links(mut self, links: LinkRules) -> Self {
        self.links = links;
        self
    }

    /// Set the school name and crisis contacts used in every fixed response.
    pub fn with_school(mut self, name: &str, crisis_contacts: &[String]) -> Self {
        self.school_name = name.to_string();
        self.templates = ResponseTemplates::for_school(name, crisis_contacts);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn templates(&self) -> &ResponseTemplates {
        &self.templates
    }

    pub fn classifier(&self) -> &ScopeClassifier {
        &self.classifier
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer `question` given the prior turns of its session.
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            return Answer::fixed(&self.templates.empty_question, None);
        }

        let (decision, reason) = self.classifier.classify_with_reason(question);
        debug!(%decision, %reason, "classified question");

        match decision {
            ScopeDecision::SafetyOverride => {
                Answer::fixed(&self.templates.safety_referral, Some(decision))
            }
            ScopeDecision::Greeting(kind) => {
                Answer::fixed(self.templates.greeting(kind), Some(decision))
            }
            ScopeDecision::OutOfScope => Answer::fixed(&self.templates.redirect, Some(decision)),
            ScopeDecision::InScope => self.answer_in_scope(question, history).await,
        }
    }

    /// Public entry point: always returns displayable text.
    pub async fn query_with_rag(&self, question: &str, history: &[ConversationTurn]) -> String {
        self.answer(question, history).await.text
    }

    async fn answer_in_scope(&self, question: &str, history: &[ConversationTurn]) -> Answer {
        let chunks: Vec<Chunk> = match self
            .index
            .query(self.embedder.as_ref(), question, self.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "retrieval failed; answering without context");
                Vec::new()
            }
        };
        debug!(retrieved = chunks.len(), k = self.top_k, "retrieved context");

        let messages = assemble_messages(&self.school_name, history, &chunks, question);
        let reply = match self.completer.complete(&messages).await {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                error!(error = format!("{e:#}"), model = self.completer.model_name(), "completion failed");
                return Answer {
                    text: self.templates.apology.clone(),
                    decision: Some(ScopeDecision::InScope),
                    retrieved: chunks.len(),
                    link: None,
                };
            }
        };

        let link = self.links.select(question, &chunks);
        let text = match &link {
            Some(link) => append_link(&reply, link),
            None => reply,
        };
        Answer {
            text,
            decision: Some(ScopeDecision::InScope),
            retrieved: chunks.len(),
            link,
        }
    }
}
