// ABOUTME: Embedding Provider abstraction and registry

pub mod local;
pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::index::model::EmbeddingProviderTag;

/// Quantization applied to a local model's weights and output vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantization {
    /// Full 32-bit floats.
    Fp32,
    /// Half precision.
    Fp16,
    /// 8-bit quantization.
    Q8,
    /// 4-bit quantization with fp16 accumulation.
    Q4f16,
}

impl Quantization {
    /// Parse a CLI/config dtype string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fp32" => Some(Self::Fp32),
            "fp16" => Some(Self::Fp16),
            "q8" => Some(Self::Q8),
            "q4f16" => Some(Self::Q4f16),
            _ => None,
        }
    }

    /// The canonical string form, as recorded in build metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Q8 => "q8",
            Self::Q4f16 => "q4f16",
        }
    }
}

/// Produces embedding vectors for searchable tool text. Implementations may
/// be local (in-process inference) or remote (an HTTP API).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The `location:model` tag identifying this provider in build metadata.
    fn tag(&self) -> EmbeddingProviderTag;

    /// The dimensionality of vectors this provider produces.
    fn dimension(&self) -> usize;

    /// One-time setup (model download/load, API key validation).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if setup fails.
    async fn initialize(&self) -> AppResult<()>;

    /// Embed a single string.
    ///
    /// # Errors
    ///
    /// Returns a transport or configuration error.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.embed_batch(&[text]).await?.into_iter().next().unwrap_or_default())
    }

    /// Embed a batch of strings in one request/inference call.
    ///
    /// # Errors
    ///
    /// Returns a transport or configuration error.
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>>;

    /// Release any held resources (model handles, connection pools).
    async fn dispose(&self) {}
}

/// Builds an `EmbeddingProvider` for a `location:model` tag plus optional dtype.
pub type ProviderFactory = Arc<dyn Fn(Option<&str>) -> AppResult<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Looks providers up by their `location:model` tag, the way `please index`
/// resolves `--provider local:retrieval-tuned` into a concrete instance.
pub struct EmbeddingProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl Default for EmbeddingProviderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }
}

impl EmbeddingProviderRegistry {
    fn register_builtins(&mut self) {
        #[cfg(feature = "local-embeddings")]
        {
            self.register("local:general-purpose", Arc::new(|dtype| {
                Ok(Arc::new(local::LocalEmbeddingProvider::general_purpose(dtype)?) as Arc<dyn EmbeddingProvider>)
            }));
            self.register("local:retrieval-tuned", Arc::new(|dtype| {
                Ok(Arc::new(local::LocalEmbeddingProvider::retrieval_tuned(dtype)?) as Arc<dyn EmbeddingProvider>)
            }));
        }
        self.register("remote:openai", Arc::new(|_dtype| {
            Ok(Arc::new(remote::RemoteEmbeddingProvider::openai()?) as Arc<dyn EmbeddingProvider>)
        }));
        self.register("remote:voyage", Arc::new(|_dtype| {
            Ok(Arc::new(remote::RemoteEmbeddingProvider::voyage()?) as Arc<dyn EmbeddingProvider>)
        }));
    }

    /// Register a factory under a `location:model` tag, overriding any builtin.
    pub fn register(&mut self, tag: &str, factory: ProviderFactory) {
        self.factories.insert(tag.to_owned(), factory);
    }

    /// Resolve `tag` (optionally with a `dtype`) into a provider instance.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the tag is unknown, or if building it
    /// fails (e.g. `local-embeddings` feature not compiled in, or a remote
    /// provider's API key is unset).
    pub fn resolve(&self, tag: &str, dtype: Option<&str>) -> AppResult<Arc<dyn EmbeddingProvider>> {
        let factory = self.factories.get(tag).ok_or_else(|| {
            crate::errors::AppError::config(format!("unknown embedding provider '{tag}'"))
        })?;
        factory(dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_round_trips() {
        for s in ["fp32", "fp16", "q8", "q4f16"] {
            assert_eq!(Quantization::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn unknown_dtype_parses_to_none() {
        assert!(Quantization::parse("int4").is_none());
    }

    #[test]
    fn unknown_provider_tag_is_a_config_error() {
        let registry = EmbeddingProviderRegistry::default();
        let err = registry.resolve("bogus:thing", None).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::Configuration);
    }
}
