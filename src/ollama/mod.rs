
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::RagError;
use crate::config::OllamaConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Capability for turning text into a fixed-dimension vector.
///
/// The production implementation calls the embedding service over HTTP;
/// tests substitute deterministic fakes.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Capability for producing a model completion, either as one blocking
/// response or as a lazy sequence of text fragments.
pub trait GenerationProvider: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String, RagError>;

    /// Fragments arrive in generation order; the iterator ends after the
    /// service's terminal marker and must not be assumed to have a fixed
    /// fragment count.
    fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn Iterator<Item = Result<String, RagError>> + Send>, RagError>;
}

/// Synchronous HTTP client for the Ollama embeddings and generate APIs.
///
/// No retries are performed here; retry policy belongs to whichever caller
/// wraps the pipeline.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedApiResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateApiChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self, RagError> {
        let base_url = config
            .ollama_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    fn post_json(&self, endpoint: &str, body: &str) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| ureq::Error::BadUri(e.to_string()))?;

        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(body)
    }
}

impl EmbeddingProvider for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        debug!("Embedding text of {} bytes", text.len());

        let request = EmbedApiRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::Embedding(format!("Failed to serialize request: {e}")))?;

        let response_text = self
            .post_json("/api/embeddings", &body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let parsed: EmbedApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {e}")))?;

        debug!("Received embedding with {} dimensions", parsed.embedding.len());
        Ok(parsed.embedding)
    }
}

impl GenerationProvider for OllamaClient {
    #[inline]
    fn generate(&self, request: &GenerateRequest) -> Result<String, RagError> {
        let body = serde_json::to_string(&GenerateApiRequest {
            model: &request.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            stream: false,
        })
        .map_err(|e| RagError::Generation(format!("Failed to serialize request: {e}")))?;

        let response_text = self
            .post_json("/api/generate", &body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let parsed: GenerateApiChunk = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Generation(format!("Failed to parse response: {e}")))?;

        Ok(parsed.response.unwrap_or_default())
    }

    #[inline]
    fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn Iterator<Item = Result<String, RagError>> + Send>, RagError> {
        let body = serde_json::to_string(&GenerateApiRequest {
            model: &request.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            stream: true,
        })
        .map_err(|e| RagError::Generation(format!("Failed to serialize request: {e}")))?;

        let response = self
            .post_json("/api/generate", &body)
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(FragmentStream {
            lines: reader.lines(),
            done: false,
        }))
    }
}

/// Lazy sequence of streamed text fragments, one NDJSON object per line.
///
/// Terminates as soon as the `done` marker is seen; the underlying response
/// body is dropped with the stream, releasing the connection without
/// draining it.
struct FragmentStream<R: BufRead> {
    lines: Lines<R>,
    done: bool,
}

impl<R: BufRead> Iterator for FragmentStream<R> {
    type Item = Result<String, RagError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(RagError::Generation(e.to_string())));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            // Lines that are not valid JSON are skipped, matching the
            // generation API's keep-alive behavior.
            let Ok(chunk) = serde_json::from_str::<GenerateApiChunk>(&line) else {
                continue;
            };

            if chunk.done {
                self.done = true;
            }

            match chunk.response {
                Some(fragment) => return Some(Ok(fragment)),
                None if self.done => return None,
                None => {}
            }
        }
    }
}
