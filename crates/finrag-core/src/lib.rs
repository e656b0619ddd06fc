//! # finrag core
//!
//! Pure retrieval-augmented question answering logic: data models, text
//! normalization, chunking, the embedding and vector store traits, guarded
//! indexing, retrieval, grounded prompt assembly, the generation contract,
//! and the orchestrator that sequences them.
//!
//! This crate does no filesystem or network I/O. Model-backed embedders,
//! generators and the SQLite store live in the `finrag` crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod store;
