// ABOUTME: Remote HTTP embedding providers: OpenAI and Voyage
// ABOUTME: Quantization hints are accepted but ignored; these providers control their own precision

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::index::model::EmbeddingProviderTag;

use super::EmbeddingProvider;

const OPENAI_MODEL: &str = "text-embedding-3-small";
const OPENAI_DIM: usize = 1536;
const VOYAGE_MODEL: &str = "voyage-3";
const VOYAGE_DIM: usize = 1024;

enum Backend {
    OpenAi,
    Voyage,
}

/// An embedding provider backed by a remote HTTP API.
pub struct RemoteEmbeddingProvider {
    backend: Backend,
    api_key: String,
    client: reqwest::Client,
}

impl RemoteEmbeddingProvider {
    /// An OpenAI `text-embedding-3-small` provider, reading `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the environment variable is unset.
    pub fn openai() -> AppResult<Self> {
        Self::new(Backend::OpenAi, "OPENAI_API_KEY")
    }

    /// A Voyage `voyage-3` provider, reading `VOYAGE_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the environment variable is unset.
    pub fn voyage() -> AppResult<Self> {
        Self::new(Backend::Voyage, "VOYAGE_API_KEY")
    }

    fn new(backend: Backend, env_var: &str) -> AppResult<Self> {
        let api_key = std::env::var(env_var).map_err(|_| {
            AppError::config(format!("{env_var} is not set")).with_hint(format!(
                "export {env_var} before using this embedding provider"
            ))
        })?;
        Ok(Self {
            backend,
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OpenAiEmbeddingEntry {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbeddingEntry>,
}

#[derive(Serialize)]
struct VoyageRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct VoyageEmbeddingEntry {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageEmbeddingEntry>,
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    fn tag(&self) -> EmbeddingProviderTag {
        let model = match self.backend {
            Backend::OpenAi => OPENAI_MODEL,
            Backend::Voyage => VOYAGE_MODEL,
        };
        EmbeddingProviderTag {
            location: "remote".into(),
            model: model.into(),
            dtype: None,
        }
    }

    fn dimension(&self) -> usize {
        match self.backend {
            Backend::OpenAi => OPENAI_DIM,
            Backend::Voyage => VOYAGE_DIM,
        }
    }

    async fn initialize(&self) -> AppResult<()> {
        Ok(())
    }

    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        match self.backend {
            Backend::OpenAi => self.embed_openai(texts).await,
            Backend::Voyage => self.embed_voyage(texts).await,
        }
    }
}

impl RemoteEmbeddingProvider {
    async fn embed_openai(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        let request = OpenAiRequest {
            model: OPENAI_MODEL,
            input: texts,
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::transport(format!(
                "OpenAI embeddings request failed: HTTP {}",
                response.status()
            )));
        }
        let parsed: OpenAiResponse = response.json().await?;
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    async fn embed_voyage(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        let request = VoyageRequest {
            model: VOYAGE_MODEL,
            input: texts,
        };
        let response = self
            .client
            .post("https://api.voyageai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::transport(format!(
                "Voyage embeddings request failed: HTTP {}",
                response.status()
            )));
        }
        let parsed: VoyageResponse = response.json().await?;
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_api_key_is_a_config_error() {
        std::env::remove_var("OPENAI_API_KEY");
        let err = RemoteEmbeddingProvider::openai().unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::Configuration);
    }

    #[test]
    #[serial]
    fn dimension_matches_declared_model() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let provider = RemoteEmbeddingProvider::openai().unwrap();
        assert_eq!(provider.dimension(), OPENAI_DIM);
        assert_eq!(provider.tag().model, OPENAI_MODEL);
        std::env::remove_var("OPENAI_API_KEY");
    }
}
