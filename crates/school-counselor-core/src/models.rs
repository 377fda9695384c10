//! Core data models used throughout School Counselor.
//!
//! These types represent the documents, chunks, conversation turns, and
//! scope decisions that flow through the ingestion and answer pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key: `"json"` or `"pdf"`.
pub const META_SOURCE_TYPE: &str = "source_type";
/// Metadata key: file name the document was loaded from.
pub const META_SOURCE_FILE: &str = "source_file";
/// Metadata key: record shape category (e.g. `"club"`, `"faq"`).
pub const META_CATEGORY: &str = "category";
/// Metadata key: array field a record was expanded from.
pub const META_SECTION: &str = "section";
/// Metadata key: 1-based page number for paginated sources.
pub const META_PAGE: &str = "page";
/// Metadata key: page count of the paginated source.
pub const META_TOTAL_PAGES: &str = "total_pages";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl MetaValue {
    /// Text view of the value; lists are joined with `", "`.
    pub fn as_text(&self) -> String {
        match self {
            MetaValue::Text(s) => s.clone(),
            MetaValue::Number(n) => n.to_string(),
            MetaValue::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<usize> for MetaValue {
    fn from(n: usize) -> Self {
        MetaValue::Number(n as f64)
    }
}

/// Ordered metadata map. `BTreeMap` keeps serialization deterministic.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A uniform text + metadata record produced by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Metadata value as text, if present.
    pub fn meta(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(MetaValue::as_text)
    }
}

/// A bounded window of a [`Document`]'s text carrying the parent's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
    /// Window position within the parent document.
    pub chunk_index: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    pub fn meta(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(MetaValue::as_text)
    }
}

/// A chunk plus its embedding. Owned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => f.write_str("user"),
            TurnRole::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Which greeting template to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GreetingKind {
    HowAreYou,
    WhatsUp,
    Default,
}

/// Outcome of the scope classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDecision {
    SafetyOverride,
    Greeting(GreetingKind),
    InScope,
    OutOfScope,
}

impl fmt::Display for ScopeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDecision::SafetyOverride => f.write_str("safety_override"),
            ScopeDecision::Greeting(GreetingKind::HowAreYou) => f.write_str("greeting (how are you)"),
            ScopeDecision::Greeting(GreetingKind::WhatsUp) => f.write_str("greeting (what's up)"),
            ScopeDecision::Greeting(GreetingKind::Default) => f.write_str("greeting"),
            ScopeDecision::InScope => f.write_str("in_scope"),
            ScopeDecision::OutOfScope => f.write_str("out_of_scope"),
        }
    }
}
