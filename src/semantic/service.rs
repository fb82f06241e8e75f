//! Match orchestration: identity string -> embedding -> ranking.
//!
//! `find_matches` is the stateless pipeline. `MatchService` is the
//! process-level holder that owns the embedder, the retry policy and the
//! current corpus, and swaps the corpus atomically on reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::semantic::corpus::CorpusStore;
use crate::semantic::embeddings::Embedder;
use crate::semantic::errors::MatchError;
use crate::semantic::identity::build_identity_string;
use crate::semantic::rank::{rank, MatchResult};
use crate::semantic::retry::{RetryPolicy, Retrying};
use crate::survey::AnswerSet;

/// Run the full pipeline for one answer set.
///
/// Any failure aborts the whole call; there are no partial results.
pub fn find_matches<E: Embedder + ?Sized>(
    answers: &AnswerSet,
    corpus: &CorpusStore,
    embedder: &E,
    k: usize,
) -> Result<Vec<MatchResult>, MatchError> {
    let identity = build_identity_string(answers);
    matches_for_identity(&identity, corpus, embedder, k)
}

/// Same as [`find_matches`] for an already-rendered identity string.
pub fn matches_for_identity<E: Embedder + ?Sized>(
    identity: &str,
    corpus: &CorpusStore,
    embedder: &E,
    k: usize,
) -> Result<Vec<MatchResult>, MatchError> {
    if identity.trim().is_empty() {
        return Err(MatchError::InvalidInput(
            "no answers were provided".to_string(),
        ));
    }
    if k == 0 {
        return Err(MatchError::InvalidInput(
            "number of matches must be at least 1".to_string(),
        ));
    }

    let query = embedder.embed(identity)?;
    rank(&query, corpus, k)
}

/// Check that vectors from `embedder` can be compared with `corpus`.
pub fn ensure_compatible<E: Embedder + ?Sized>(
    corpus: &CorpusStore,
    embedder: &E,
) -> Result<(), MatchError> {
    if corpus.dimensions() != embedder.dimensions() {
        return Err(MatchError::DimensionMismatch {
            context: format!("corpus vs embedder '{}'", embedder.model_id()),
            expected: embedder.dimensions(),
            got: corpus.dimensions(),
        });
    }

    match corpus.model() {
        Some(model) if model != embedder.model_id() => Err(MatchError::ModelMismatch {
            corpus: model.to_string(),
            embedder: embedder.model_id().to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            log::warn!(
                "corpus has no model tag, assuming it was built with '{}'",
                embedder.model_id()
            );
            Ok(())
        }
    }
}

/// Result of a match request, with the identity string that produced it.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub identity: String,
    pub matches: Vec<MatchResult>,
}

/// Long-lived matching service.
///
/// The corpus is read through an `Arc` cloned out of the lock, so the embed
/// call never holds the lock and a reload never disturbs an in-flight
/// request.
pub struct MatchService {
    embedder: Box<dyn Embedder>,
    corpus: RwLock<Arc<CorpusStore>>,
    snapshot_path: Option<PathBuf>,
    retry: RetryPolicy,
    default_k: usize,
}

impl MatchService {
    pub fn new(
        embedder: Box<dyn Embedder>,
        corpus: CorpusStore,
        retry: RetryPolicy,
        default_k: usize,
    ) -> Result<Self, MatchError> {
        ensure_compatible(&corpus, embedder.as_ref())?;

        Ok(Self {
            embedder,
            corpus: RwLock::new(Arc::new(corpus)),
            snapshot_path: None,
            retry,
            default_k: default_k.max(1),
        })
    }

    /// Load the snapshot at `path` and build the service around it.
    pub fn open(
        embedder: Box<dyn Embedder>,
        path: &Path,
        retry: RetryPolicy,
        default_k: usize,
    ) -> Result<Self, MatchError> {
        let corpus = CorpusStore::load(path)?;
        let mut service = Self::new(embedder, corpus, retry, default_k)?;
        service.snapshot_path = Some(path.to_path_buf());
        Ok(service)
    }

    /// The corpus as of now. Later reloads do not affect the returned store.
    pub fn corpus(&self) -> Arc<CorpusStore> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Find the closest respondents, `k` defaulting to the configured value.
    pub fn find_matches(
        &self,
        answers: &AnswerSet,
        k: Option<usize>,
    ) -> Result<MatchOutcome, MatchError> {
        let identity = build_identity_string(answers);
        let k = k.unwrap_or(self.default_k);
        let corpus = self.corpus();
        let embedder = Retrying::new(self.embedder.as_ref(), &self.retry);

        log::debug!("matching identity string:\n{}", identity);
        let matches = matches_for_identity(&identity, &corpus, &embedder, k)?;

        if let Some(best) = matches.first() {
            log::info!(
                "best match {} (score {:.4}) out of {} records",
                best.participant_id,
                best.similarity_score,
                corpus.len()
            );
        }

        Ok(MatchOutcome { identity, matches })
    }

    /// Replace the corpus with `corpus` after checking compatibility.
    pub fn swap_corpus(&self, corpus: CorpusStore) -> Result<usize, MatchError> {
        ensure_compatible(&corpus, self.embedder.as_ref())?;
        let size = corpus.len();

        let mut guard = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(corpus);

        Ok(size)
    }

    /// Reload the snapshot this service was opened from.
    ///
    /// On failure the current corpus stays in place.
    pub fn reload(&self) -> Result<usize, MatchError> {
        let path = self.snapshot_path.as_deref().ok_or_else(|| {
            MatchError::InvalidInput("service was not opened from a snapshot file".to_string())
        })?;

        let corpus = CorpusStore::load(path)?;
        let size = self.swap_corpus(corpus)?;
        log::info!("reloaded corpus from {} ({} records)", path.display(), size);
        Ok(size)
    }
}
