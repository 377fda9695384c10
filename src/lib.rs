//! # School Counselor
//!
//! A retrieval-augmented question-answering service for a single high
//! school. Students ask about courses, graduation requirements, college
//! preparation, clubs, and counselors; answers come only from the school's
//! own documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ data/       │──▶│ Load+Chunk  │──▶│  SQLite   │
//! │ JSON / PDF  │   │   +Embed    │   │  chunks   │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ load once
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │counselor │       │  /chat   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! Domain logic (classifier, index, responder, sessions) lives in
//! `school-counselor-core`; this crate supplies configuration, providers,
//! persistence, and the outer surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`sources`] | Data directory discovery and loading |
//! | [`embedding`] | OpenAI / Ollama / local embedders |
//! | [`completion`] | OpenAI / Ollama chat completers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Persisted vector index |
//! | [`index_cmd`] | Build-or-load and the `index` / `sources` commands |
//! | [`chat`] | Chat turns and quick actions |
//! | [`server`] | HTTP server |

pub mod chat;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index_cmd;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sources;
pub mod sqlite_store;
