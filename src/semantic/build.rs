//! Offline embedding pass: survey rows -> corpus snapshot.

use indicatif::ProgressBar;

use crate::semantic::corpus::{CorpusRecord, CorpusStore};
use crate::semantic::embeddings::Embedder;
use crate::semantic::errors::MatchError;
use crate::semantic::identity::build_identity_string;
use crate::survey::{AnswerSet, SurveyResponse};

/// Embed every survey row and collect the results into a tagged store.
///
/// Rows that render to an empty identity string are skipped with a warning,
/// since there is nothing to embed for them. Texts are sent to the embedder
/// in chunks of `batch_size`.
pub fn build_corpus<E: Embedder + ?Sized>(
    responses: Vec<SurveyResponse>,
    embedder: &E,
    batch_size: usize,
    progress: Option<&ProgressBar>,
) -> Result<CorpusStore, MatchError> {
    let mut pending = Vec::with_capacity(responses.len());
    for response in responses {
        let data = response.display_payload();
        let participant_id = response.participant_id.clone();
        let identity = build_identity_string(&AnswerSet::from(response));

        if identity.trim().is_empty() {
            log::warn!("skipping participant {}: no usable answers", participant_id);
            continue;
        }
        pending.push((participant_id, identity, data));
    }

    if let Some(bar) = progress {
        bar.set_length(pending.len() as u64);
    }

    let mut records = Vec::with_capacity(pending.len());
    for chunk in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk.iter().map(|(_, identity, _)| identity.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;

        if embeddings.len() != chunk.len() {
            return Err(MatchError::EmbedderFailed(format!(
                "expected {} embeddings, got {}",
                chunk.len(),
                embeddings.len()
            )));
        }

        for ((participant_id, _, data), embedding) in chunk.iter().zip(embeddings) {
            records.push(CorpusRecord {
                participant_id: participant_id.clone(),
                embedding,
                data: data.clone(),
            });
        }

        if let Some(bar) = progress {
            bar.inc(chunk.len() as u64);
        }
    }

    CorpusStore::from_records(
        records,
        Some(embedder.model_id().to_string()),
        Some(embedder.dimensions()),
    )
}
