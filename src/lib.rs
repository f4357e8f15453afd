//! deepsearch - decomposed retrieval over a remote knowledge base
//!
//! A query is rewritten into up to five focused sub-queries by a fine-tuned
//! sequence model, each sub-query is searched concurrently against a signed
//! knowledge-base API, and the passages are merged into a single deduplicated
//! ranking, optionally rescored by a rerank service.

pub mod auth;
pub mod cli;
pub mod config;
pub mod decompose;
pub mod error;
pub mod knowledge;
pub mod retrieval;
pub mod server;

pub use error::{DeepSearchError, Result};
