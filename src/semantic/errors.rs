use std::path::PathBuf;

use crate::semantic::embeddings::EmbedError;

/// How a failure should be reported to whoever asked for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying later may succeed.
    Transient,
    /// This request cannot be served; other requests are unaffected.
    Request,
    /// Matching is unavailable until an operator fixes the setup.
    Fatal,
}

/// Every failure the matching pipeline can surface.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("corpus snapshot not found at {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("invalid corpus snapshot {}: {reason}", path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("corpus snapshot contains no records")]
    EmptyCorpus,

    #[error("duplicate participant id in corpus: {0}")]
    DuplicateParticipant(String),

    #[error("dimension mismatch for {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("embedding model mismatch: corpus built with '{corpus}', embedder is '{embedder}'")]
    ModelMismatch { corpus: String, embedder: String },

    #[error("transient embedding failure: {0}")]
    TransientFailure(String),

    #[error("embedding service failed: {0}")]
    EmbedderFailed(String),

    #[error("degenerate vector: {0}")]
    DegenerateVector(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("participant not found: {0}")]
    UnknownParticipant(String),
}

impl MatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            MatchError::TransientFailure(_) => FailureKind::Transient,
            MatchError::InvalidInput(_)
            | MatchError::DegenerateVector(_)
            | MatchError::UnknownParticipant(_) => FailureKind::Request,
            MatchError::CorpusNotFound(_)
            | MatchError::InvalidSnapshot { .. }
            | MatchError::EmptyCorpus
            | MatchError::DuplicateParticipant(_)
            | MatchError::DimensionMismatch { .. }
            | MatchError::ModelMismatch { .. }
            | MatchError::EmbedderFailed(_) => FailureKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Fatal
    }

    /// Message safe to show an end user.
    pub fn user_message(&self) -> String {
        match self {
            MatchError::InvalidInput(reason) => format!("invalid answers: {reason}"),
            MatchError::UnknownParticipant(_) => "participant not found".to_string(),
            _ => match self.kind() {
                FailureKind::Transient | FailureKind::Request => {
                    "could not compute a match, try again".to_string()
                }
                FailureKind::Fatal => "matching is unavailable".to_string(),
            },
        }
    }
}

impl From<EmbedError> for MatchError {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::Transient(msg) => MatchError::TransientFailure(msg),
            EmbedError::InvalidInput(msg) => MatchError::InvalidInput(msg),
            EmbedError::Failed(msg) => MatchError::EmbedderFailed(msg),
        }
    }
}
