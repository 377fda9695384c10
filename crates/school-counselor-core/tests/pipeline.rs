//! End-to-end tests for the answer pipeline: records → chunks → index →
//! classifier → responder → conversation store, with fake capabilities that
//! count their calls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use school_counselor_core::chunk::{chunk_documents, ChunkParams};
use school_counselor_core::classifier::ScopeRules;
use school_counselor_core::completion::{ChatMessage, Completer, Role};
use school_counselor_core::embedding::Embedder;
use school_counselor_core::links::{KeywordTier, Link, LinkCandidate, LinkRules};
use school_counselor_core::models::{Chunk, GreetingKind, ScopeDecision, TurnRole};
use school_counselor_core::records::RecordLoader;
use school_counselor_core::responder::default_crisis_contacts;
use school_counselor_core::store::InMemoryStore;
use school_counselor_core::{ConversationStore, Responder, ScopeClassifier, VectorIndex};

const SCHOOL: &str = "Green Level High School";
const DIMS: usize = 256;

// ─── Fake capabilities ──────────────────────────────────────────────

/// Hashed bag-of-words embedder. Identical text gives identical vectors.
#[derive(Default)]
struct TokenEmbedder {
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl TokenEmbedder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn token_bucket(token: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % DIMS as u64) as usize
}

#[async_trait]
impl Embedder for TokenEmbedder {
    fn model_name(&self) -> &str {
        "token-hash"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("embedding provider unreachable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for token in t
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|s| !s.is_empty())
                {
                    v[token_bucket(token)] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Records every request and answers with the context lines that mention
/// credits (or a fixed line when none do).
#[derive(Default)]
struct RecordingCompleter {
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    broken: bool,
}

impl RecordingCompleter {
    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.broken {
            anyhow::bail!("model overloaded");
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let cited: Vec<&str> = last
            .lines()
            .filter(|l| l.to_lowercase().contains("credits"))
            .collect();
        if cited.is_empty() {
            Ok("I don't have that information, please ask your counselor.".to_string())
        } else {
            Ok(format!("According to the school: {}", cited.join("; ")))
        }
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn corpus() -> Vec<Chunk> {
    let loader = RecordLoader::default();
    let mut docs = loader.from_value(
        &json!([
            {"requirement": "English", "credits": 4, "details": "Required for graduation"},
            {"requirement": "Math", "credits": 4, "details": "Required for graduation"},
            {"requirement": "Science", "credits": 3, "details": "Required for graduation"},
            {"requirement": "Social Studies", "credits": 4, "details": "Required for graduation"},
            {"requirement": "Total", "credits": 22, "details": "Required for graduation"}
        ]),
        "glhs_graduation_requirments.json",
    );
    docs.extend(loader.from_value(
        &json!({"clubs": [
            {"name": "Robotics", "advisors": ["Ms. Lee"], "meeting_day": "Tuesday"},
            {"name": "Chess", "advisors": ["Mr. Cho"], "meeting_day": "Friday"}
        ]}),
        "clubs.json",
    ));
    docs.extend(loader.from_value(
        &json!({"program_name": "Career and College Promise", "institution": "Wake Tech",
                "description": "Tuition-free college courses whose credits transfer to UNC universities."}),
        "wake_tech.json",
    ));
    chunk_documents(&docs, &ChunkParams::default())
}

struct Harness {
    embedder: Arc<TokenEmbedder>,
    completer: Arc<RecordingCompleter>,
    responder: Responder,
    chunks: Vec<Chunk>,
}

async fn harness_with(completer: RecordingCompleter, links: LinkRules) -> Harness {
    let embedder = Arc::new(TokenEmbedder::default());
    let completer = Arc::new(completer);
    let chunks = corpus();
    let store = InMemoryStore::new();
    let index = VectorIndex::build(&store, embedder.as_ref(), chunks.clone(), 4)
        .await
        .unwrap();
    let classifier = ScopeClassifier::new(ScopeRules::default().with_aliases(&["green level", "glhs"]));
    let responder = Responder::new(Arc::new(index), embedder.clone(), completer.clone())
        .with_classifier(classifier)
        .with_links(links)
        .with_school(SCHOOL, &default_crisis_contacts());
    // Build-time embedding calls are not part of any request.
    embedder.calls.store(0, Ordering::SeqCst);
    Harness {
        embedder,
        completer,
        responder,
        chunks,
    }
}

async fn harness() -> Harness {
    harness_with(RecordingCompleter::default(), LinkRules::default()).await
}

// ─── Short-circuit paths ────────────────────────────────────────────

#[tokio::test]
async fn crisis_language_returns_referral_without_model_calls() {
    let h = harness().await;
    for q in [
        "I want to kill myself",
        "hi, I've been thinking about suicide",
        "what classes help if I want to hurt myself",
    ] {
        let answer = h.responder.answer(q, &[]).await;
        assert_eq!(answer.decision, Some(ScopeDecision::SafetyOverride), "{q}");
        assert_eq!(answer.text, h.responder.templates().safety_referral);
        assert!(answer.text.contains("988"));
    }
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.completer.requests().is_empty());
}

#[tokio::test]
async fn greeting_returns_template_without_retrieval() {
    let h = harness().await;
    let answer = h.responder.answer("Hi there!", &[]).await;
    assert_eq!(answer.decision, Some(ScopeDecision::Greeting(GreetingKind::Default)));
    assert!(answer.text.starts_with("Hello! I'm the Green Level High School AI counselor."));

    let answer = h.responder.answer("how are you doing?", &[]).await;
    assert_eq!(answer.text, h.responder.templates().greeting_how_are_you);

    assert_eq!(h.embedder.calls(), 0);
    assert!(h.completer.requests().is_empty());
}

#[tokio::test]
async fn off_topic_questions_are_redirected() {
    let h = harness().await;
    for q in ["What's the weather today?", "what is 2+2"] {
        let answer = h.responder.answer(q, &[]).await;
        assert_eq!(answer.decision, Some(ScopeDecision::OutOfScope), "{q}");
        assert_eq!(answer.text, h.responder.templates().redirect);
    }
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.completer.requests().is_empty());
}

#[tokio::test]
async fn empty_question_prompts_for_input() {
    let h = harness().await;
    let answer = h.responder.answer("   ", &[]).await;
    assert_eq!(answer.decision, None);
    assert_eq!(
        answer.text,
        "I'm here to help! Please ask me a question about Green Level High School."
    );
    assert_eq!(h.embedder.calls(), 0);
}

// ─── Retrieval-augmented path ───────────────────────────────────────

#[tokio::test]
async fn graduation_question_is_answered_from_retrieved_credits() {
    let h = harness().await;
    let answer = h
        .responder
        .answer("What are the graduation requirements?", &[])
        .await;

    assert_eq!(answer.decision, Some(ScopeDecision::InScope));
    assert_eq!(answer.retrieved, 5);
    assert_eq!(h.embedder.calls(), 1);
    assert!(answer.text.starts_with("According to the school:"), "{}", answer.text);
    assert!(answer.text.contains("Credits"));

    let requests = h.completer.requests();
    assert_eq!(requests.len(), 1);
    let msgs = &requests[0];
    assert_eq!(msgs[0].role, Role::System);
    assert!(msgs[0].content.contains("Never include links"));
    assert_eq!(msgs.last().unwrap().role, Role::User);
    assert!(msgs
        .last()
        .unwrap()
        .content
        .contains("Student question: What are the graduation requirements?"));
}

#[tokio::test]
async fn arithmetic_in_class_context_goes_to_the_model() {
    let h = harness().await;
    let answer = h.responder.answer("what is 2+2 in my math class", &[]).await;
    assert_eq!(answer.decision, Some(ScopeDecision::InScope));
    assert_eq!(h.completer.requests().len(), 1);
}

#[tokio::test]
async fn exact_chunk_text_is_top_result() {
    let h = harness().await;
    let index = h.responder.index();
    for chunk in &h.chunks {
        let hits = index
            .query(h.embedder.as_ref(), &chunk.text, 1)
            .await
            .unwrap();
        assert_eq!(hits[0].text, chunk.text);
    }
}

#[tokio::test]
async fn retrieval_failure_degrades_to_empty_context() {
    let h = harness().await;
    h.embedder.offline.store(true, Ordering::SeqCst);
    let answer = h
        .responder
        .answer("Which clubs meet on Tuesday at GLHS?", &[])
        .await;
    assert_eq!(answer.decision, Some(ScopeDecision::InScope));
    assert_eq!(answer.retrieved, 0);
    assert_eq!(
        answer.text,
        "I don't have that information, please ask your counselor."
    );
    assert_eq!(h.completer.requests().len(), 1);
}

#[tokio::test]
async fn completion_failure_returns_apology() {
    let h = harness_with(RecordingCompleter::broken(), LinkRules::default()).await;
    let text = h
        .responder
        .query_with_rag("How many credits do I need to graduate?", &[])
        .await;
    assert_eq!(text, h.responder.templates().apology);
}

#[tokio::test]
async fn program_link_is_appended_only_when_backed() {
    let links = LinkRules {
        club_directory: Some(Link {
            label: "Club directory".into(),
            url: "https://school.example/clubs".into(),
        }),
        candidates: vec![LinkCandidate {
            label: "Career & College Promise".into(),
            url: "https://college.example/ccp".into(),
            source_tag: "wake_tech".into(),
            tiers: vec![
                KeywordTier {
                    weight: 3,
                    keywords: vec!["career and college promise".into()],
                },
                KeywordTier {
                    weight: 1,
                    keywords: vec!["tuition".into(), "transfer".into()],
                },
            ],
        }],
        ..LinkRules::default()
    };
    let h = harness_with(RecordingCompleter::default(), links).await;

    let answer = h
        .responder
        .answer("Do Career and College Promise credits transfer?", &[])
        .await;
    assert!(answer.retrieved > 0);
    assert_eq!(answer.link.as_ref().map(|l| l.label.as_str()), Some("Career & College Promise"));
    assert!(answer
        .text
        .ends_with("\n\nCareer & College Promise: https://college.example/ccp"));

    let answer = h.responder.answer("What clubs are at GLHS?", &[]).await;
    assert!(answer.text.ends_with("\n\nClub directory: https://school.example/clubs"));
}

// ─── Conversation store ─────────────────────────────────────────────

#[tokio::test]
async fn second_turn_prompt_carries_first_turn_in_order() {
    let h = harness().await;
    let sessions = ConversationStore::new();

    for q in ["What are the graduation requirements?", "Which of those is hardest?"] {
        let history = sessions.get_or_create("student-1");
        let reply = h.responder.query_with_rag(q, &history).await;
        sessions.append("student-1", TurnRole::User, q);
        sessions.append("student-1", TurnRole::Assistant, reply);
    }

    let requests = h.completer.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[1].role, Role::User);
    assert_eq!(second[1].content, "What are the graduation requirements?");
    assert_eq!(second[2].role, Role::Assistant);
    assert!(second[2].content.starts_with("According to the school:"));
    assert!(second[3].content.contains("Student question: Which of those is hardest?"));
    assert_eq!(sessions.get_or_create("student-1").len(), 4);
}
