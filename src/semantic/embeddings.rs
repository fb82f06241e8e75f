//! Embedders: text in, fixed-length vector out.
//!
//! - `HashEmbedder`: deterministic stand-in, no model, no network
//! - `FastembedEmbedder`: local fastembed model with cache directory
//! - `OpenAiEmbedder` (see `openai`): remote embeddings endpoint
//!
//! Every implementation rejects blank text before doing any work.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use fastembed::{InitOptions, TextEmbedding};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::config::{EmbedderConfig, EmbedderProvider};
use crate::semantic::openai::OpenAiEmbedder;

/// Default download timeout for model files (5 minutes)
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Network trouble, rate limiting or a timeout. Safe to retry.
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    InvalidInput(String),

    /// Misconfiguration or a broken response. Retrying will not help.
    #[error("{0}")]
    Failed(String),
}

impl EmbedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbedError::Transient(_))
    }
}

/// Anything that can turn an identity string into a vector.
///
/// Vectors from one embedder share `dimensions()` and are only comparable
/// with vectors tagged with the same `model_id()`.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts)
    }
}

pub(crate) fn ensure_text(text: &str) -> Result<(), EmbedError> {
    if text.trim().is_empty() {
        return Err(EmbedError::InvalidInput(
            "refusing to embed empty text".to_string(),
        ));
    }
    Ok(())
}

/// Deterministic embedder seeded by the SHA-256 of the input text.
///
/// Identical text always yields a bit-identical vector with components in
/// [-1, 1). Useful for tests and offline demos; it carries no semantics.
pub struct HashEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: format!("hash-{dimensions}"),
        }
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        ensure_text(text)?;

        let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let mut rng = StdRng::from_seed(digest);

        Ok((0..self.dimensions)
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect())
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct FastembedEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl FastembedEmbedder {
    /// Load (downloading on first use) the named model.
    ///
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbedError> {
        let model_enum = Self::parse_model_name(model_name)?;
        let timeout = download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);
        log::debug!(
            "loading fastembed model '{}' (download timeout {}s)",
            model_name,
            timeout.as_secs()
        );

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbedError::Failed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model =
            TextEmbedding::try_new(options).map_err(|e| EmbedError::Failed(e.to_string()))?;

        let dimensions = Self::measure_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbedError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "bge-large-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGELargeENV15Q),
            _ => Err(EmbedError::Failed(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, \
                 bge-base-en-v1.5, bge-large-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    fn measure_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbedError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbedError::Failed(format!("Failed to measure dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbedError::Failed("Model returned no embedding".to_string()))
    }
}

impl Embedder for FastembedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        ensure_text(text)?;

        let mut model = self.model.lock().map_err(|e| {
            EmbedError::Failed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbedError::Failed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("No embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        for text in texts {
            ensure_text(text)?;
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbedError::Failed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedError::Failed(e.to_string()))
    }
}

/// Build the configured embedder. Called once at process start.
pub fn embedder_from_config(
    config: &EmbedderConfig,
    base_path: PathBuf,
) -> Result<Box<dyn Embedder>, EmbedError> {
    let embedder: Box<dyn Embedder> = match config.provider {
        EmbedderProvider::Hash => Box::new(HashEmbedder::new(config.dimensions)),
        EmbedderProvider::Fastembed => Box::new(FastembedEmbedder::new(
            &config.model,
            base_path,
            Some(Duration::from_secs(config.download_timeout_secs)),
        )?),
        EmbedderProvider::Openai => Box::new(OpenAiEmbedder::from_config(config)?),
    };

    log::info!(
        "initialized {:?} embedder '{}' ({} dimensions)",
        config.provider,
        embedder.model_id(),
        embedder.dimensions()
    );
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);

        let a = embedder.embed("Music relationship: obsessed").unwrap();
        let b = embedder.embed("Music relationship: obsessed").unwrap();
        let c = embedder.embed("Music relationship: casual").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|x| (-1.0..1.0).contains(x)));
    }

    #[test]
    fn test_hash_embedder_rejects_blank_text() {
        let embedder = HashEmbedder::new(8);
        assert!(matches!(embedder.embed(""), Err(EmbedError::InvalidInput(_))));
        assert!(matches!(
            embedder.embed(" \n\t"),
            Err(EmbedError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_default_batch_matches_single() {
        let embedder = HashEmbedder::new(16);
        let texts = vec!["one".to_string(), "two".to_string()];

        let batch = embedder.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two").unwrap());
    }

    #[test]
    fn test_hash_model_id_carries_dimensions() {
        assert_eq!(HashEmbedder::new(384).model_id(), "hash-384");
    }

    #[test]
    fn test_hash_provider_ignores_model_name() {
        let config = EmbedderConfig {
            provider: EmbedderProvider::Hash,
            model: "text-embedding-3-small".to_string(),
            dimensions: 48,
            ..EmbedderConfig::default()
        };
        let temp_dir = tempfile::tempdir().unwrap();

        let embedder = embedder_from_config(&config, temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(embedder.model_id(), "hash-48");
        assert_eq!(embedder.dimensions(), 48);
    }

    #[test]
    fn test_invalid_fastembed_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result =
            FastembedEmbedder::new("nonexistent-model", temp_dir.path().to_path_buf(), None);
        assert!(matches!(result, Err(EmbedError::Failed(_))));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_fastembed_generation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model =
            FastembedEmbedder::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf(), None)
                .unwrap();

        assert_eq!(model.dimensions(), 384);
        let embedding = model.embed("Music relationship: obsessed").unwrap();
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }
}
