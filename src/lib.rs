//! # finrag
//!
//! Grounded question answering over financial documents (10-K and 10-Q
//! filings, reports, uploaded text and PDFs).
//!
//! Documents are chunked, embedded and indexed into a vector collection;
//! each question retrieves the closest passages and a language model
//! answers from those passages only, citing them as `Source N`. When
//! nothing relevant is retrieved the answer is an explicit refusal and the
//! model is never called.
//!
//! The retrieval pipeline itself lives in the `finrag-core` crate; this
//! crate supplies configuration, concrete model providers, the SQLite
//! store, document loading, the CLI and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌────────────┐
//! │  Documents  │──▶│   finrag_core        │──▶│ VectorStore │
//! │ JSON/TXT/PDF│   │ chunk→embed→retrieve │   │ memory/SQLite│
//! └─────────────┘   │ →prompt→generate     │   └────────────┘
//!                   └──────────┬───────────┘
//!                      ┌───────┴───────┐
//!                      ▼               ▼
//!                 ┌──────────┐   ┌──────────┐
//!                 │   CLI    │   │   HTTP   │
//!                 │ (finrag) │   │  (axum)  │
//!                 └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing-subscriber` initialization |
//! | [`documents`] | Loading JSON, text and PDF documents |
//! | [`embedding`] | Embedding providers (local, OpenAI, Ollama, hash) |
//! | [`generation`] | Generation providers (Ollama, OpenAI) |
//! | [`http`] | Shared HTTP client and retry policy |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Database schema |
//! | [`catalog`] | Persistent document catalog |
//! | [`sqlite_store`] | Persistent vector store |
//! | [`runtime`] | Process-wide shared pipeline |
//! | [`session`] | Server-side document staging |
//! | [`server`] | HTTP API |
//! | [`ask`] | `ask` and `chunk` commands |
//! | [`status`] | `status` and `clear` commands |

pub mod ask;
pub mod catalog;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod logging;
pub mod migrate;
pub mod runtime;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod status;
