//! # School Counselor Core
//!
//! Shared logic for the School Counselor service: data models, record
//! rendering, page filtering, chunking, the vector index, the scope
//! classifier, prompt assembly, link attachment, the retrieval-augmented
//! responder, and the conversation store.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The two
//! external capabilities it needs are expressed as traits:
//! [`embedding::Embedder`] and [`completion::Completer`]. Persistence of the
//! vector index goes through [`store::ChunkStore`].
//!
//! ```text
//! question ──▶ classifier ──┬─▶ safety / greeting / redirect text
//!                           └─▶ index.query ─▶ prompt ─▶ Completer ─▶ links ─▶ answer
//! ```

pub mod chunk;
pub mod classifier;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod index;
pub mod links;
pub mod models;
pub mod pages;
pub mod prompt;
pub mod records;
pub mod responder;
pub mod sessions;
pub mod store;
pub mod text;

pub use classifier::{ScopeClassifier, ScopeRules};
pub use completion::Completer;
pub use embedding::Embedder;
pub use index::VectorIndex;
pub use models::{Chunk, ConversationTurn, Document, GreetingKind, ScopeDecision, TurnRole};
pub use responder::{Answer, Responder};
pub use sessions::ConversationStore;
