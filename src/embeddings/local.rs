// ABOUTME: Local in-process embedding provider backed by fastembed
// ABOUTME: The retrieval-tuned variant MRL-truncates the general-purpose model's output and renormalizes

#![cfg(feature = "local-embeddings")]

use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::errors::{AppError, AppResult};
use crate::index::model::EmbeddingProviderTag;

use super::{EmbeddingProvider, Quantization};

const GENERAL_PURPOSE_DIM: usize = 384;
const RETRIEVAL_TUNED_DIM: usize = 256;

enum Variant {
    GeneralPurpose,
    RetrievalTuned,
}

/// Runs a fastembed model in-process. `retrieval-tuned` reuses the same
/// underlying model as `general-purpose` and truncates its output to the
/// first 256 dimensions (Matryoshka representation learning), renormalizing
/// to unit length so cosine similarity stays well-defined.
pub struct LocalEmbeddingProvider {
    variant: Variant,
    dtype: Quantization,
    model: Mutex<Option<TextEmbedding>>,
}

impl LocalEmbeddingProvider {
    /// A 384-dimension general-purpose provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dtype` is unrecognized.
    pub fn general_purpose(dtype: Option<&str>) -> AppResult<Self> {
        Self::new(Variant::GeneralPurpose, dtype)
    }

    /// A 256-dimension retrieval-tuned provider (MRL truncation of the same model).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dtype` is unrecognized.
    pub fn retrieval_tuned(dtype: Option<&str>) -> AppResult<Self> {
        Self::new(Variant::RetrievalTuned, dtype)
    }

    fn new(variant: Variant, dtype: Option<&str>) -> AppResult<Self> {
        let dtype = match dtype {
            Some(s) => Quantization::parse(s)
                .ok_or_else(|| AppError::config(format!("unknown embedding dtype '{s}'")))?,
            None => Quantization::Fp32,
        };
        Ok(Self {
            variant,
            dtype,
            model: Mutex::new(None),
        })
    }

    fn fastembed_model(&self) -> EmbeddingModel {
        match self.dtype {
            Quantization::Fp32 | Quantization::Fp16 => EmbeddingModel::AllMiniLML6V2,
            Quantization::Q8 | Quantization::Q4f16 => EmbeddingModel::AllMiniLML6V2Q,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn tag(&self) -> EmbeddingProviderTag {
        let model = match self.variant {
            Variant::GeneralPurpose => "general-purpose",
            Variant::RetrievalTuned => "retrieval-tuned",
        };
        EmbeddingProviderTag {
            location: "local".into(),
            model: model.into(),
            dtype: Some(self.dtype.as_str().into()),
        }
    }

    fn dimension(&self) -> usize {
        match self.variant {
            Variant::GeneralPurpose => GENERAL_PURPOSE_DIM,
            Variant::RetrievalTuned => RETRIEVAL_TUNED_DIM,
        }
    }

    async fn initialize(&self) -> AppResult<()> {
        let model_name = self.fastembed_model();
        let loaded = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(InitOptions::new(model_name).with_show_download_progress(false))
        })
        .await
        .map_err(|e| AppError::internal(format!("embedding model init task panicked: {e}")))?
        .map_err(|e| AppError::config(format!("failed to load local embedding model: {e}")))?;

        *self.model.lock().unwrap() = Some(loaded);
        Ok(())
    }

    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_owned()).collect();
        let dim = self.dimension();
        let retrieval_tuned = matches!(self.variant, Variant::RetrievalTuned);

        if self.model.lock().unwrap().is_none() {
            self.initialize().await?;
        }

        let guard = self.model.lock().unwrap();
        let model = guard
            .as_ref()
            .ok_or_else(|| AppError::internal("embedding model not initialized"))?;
        let raw = model
            .embed(owned, None)
            .map_err(|e| AppError::internal(format!("embedding inference failed: {e}")))?;

        Ok(raw
            .into_iter()
            .map(|vector| {
                if retrieval_tuned {
                    truncate_and_renormalize(&vector, dim)
                } else {
                    vector
                }
            })
            .collect())
    }
}

fn truncate_and_renormalize(vector: &[f32], dim: usize) -> Vec<f32> {
    let mut truncated: Vec<f32> = vector.iter().take(dim).copied().collect();
    let norm: f32 = truncated.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut truncated {
            *x /= norm;
        }
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_and_renormalize_produces_unit_vector() {
        let vector = vec![3.0, 4.0, 0.0, 0.0];
        let result = truncate_and_renormalize(&vector, 2);
        assert_eq!(result.len(), 2);
        let norm: f32 = result.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn tags_reflect_variant_and_dtype() {
        let provider = LocalEmbeddingProvider::general_purpose(Some("q8")).unwrap();
        let tag = provider.tag();
        assert_eq!(tag.location, "local");
        assert_eq!(tag.model, "general-purpose");
        assert_eq!(tag.dtype.as_deref(), Some("q8"));
        assert_eq!(provider.dimension(), GENERAL_PURPOSE_DIM);
    }

    #[test]
    fn retrieval_tuned_has_smaller_dimension() {
        let provider = LocalEmbeddingProvider::retrieval_tuned(None).unwrap();
        assert_eq!(provider.dimension(), RETRIEVAL_TUNED_DIM);
    }

    #[test]
    fn unknown_dtype_is_rejected() {
        assert!(LocalEmbeddingProvider::general_purpose(Some("int4")).is_err());
    }
}
