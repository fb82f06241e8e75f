//! Embedding-based taste matching.
//!
//! Answers are rendered into an identity string, embedded, and compared
//! against a precomputed corpus of survey respondents by cosine similarity.
//!
//! # Architecture
//!
//! - `identity`: Renders answer sets into identity strings
//! - `embeddings`: `Embedder` trait plus hash and fastembed implementations
//! - `openai`: Remote embeddings endpoint
//! - `retry`: Backoff policy for transient embedder failures
//! - `corpus`: Snapshot loading and the in-memory corpus store
//! - `rank`: Exhaustive cosine similarity ranking
//! - `build`: Offline pass that embeds the survey into a snapshot
//! - `service`: The match pipeline and its long-lived service

mod build;
mod corpus;
pub mod embeddings;
mod errors;
mod identity;
mod openai;
mod rank;
mod retry;
mod service;

pub use build::build_corpus;
pub use corpus::{CorpusRecord, CorpusStore};
pub use embeddings::{embedder_from_config, Embedder, HashEmbedder};
pub use errors::{FailureKind, MatchError};
pub use identity::build_identity_string;
pub use rank::{cosine_similarity, MatchResult};
pub use retry::{RetryPolicy, Retrying};
pub use service::{find_matches, MatchOutcome, MatchService};

/// Default snapshot file name under the base path
pub const DEFAULT_SNAPSHOT: &str = "survey_embeddings.json";

/// Default number of matches returned
pub const DEFAULT_TOP_K: usize = 5;
