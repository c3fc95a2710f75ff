
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::history::HistoryBuffer;
use crate::index::VectorIndex;
use crate::ollama::{EmbeddingProvider, GenerateRequest, GenerationProvider};
use crate::store::DocumentStore;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTINUATION_SLACK: usize = 50;

/// One logical user query against the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagRequest {
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

/// Non-streaming answer with the continuation handshake.
///
/// When `needs_continue` is set the caller feeds `continuation_token` back as
/// the next call's prompt and concatenates the returned texts until the flag
/// clears. No iteration bound is enforced here; capping is the caller's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RagAnswer {
    pub text: String,
    #[serde(rename = "continue")]
    pub needs_continue: bool,
    pub continuation_token: Option<String>,
}

/// Request-time pipeline: embed the query, retrieve the nearest chunks, merge
/// with history, compose the prompt, and run generation.
///
/// The index and store are loaded once at startup and shared read-only; the
/// providers are injected so tests can substitute deterministic fakes.
pub struct QueryOrchestrator<E, G> {
    index: Arc<VectorIndex>,
    store: Arc<DocumentStore>,
    embedder: E,
    generator: G,
    history: Option<HistoryBuffer>,
    top_k: usize,
    continuation_slack: usize,
}

impl<E: EmbeddingProvider, G: GenerationProvider> QueryOrchestrator<E, G> {
    #[inline]
    pub fn new(
        index: Arc<VectorIndex>,
        store: Arc<DocumentStore>,
        embedder: E,
        generator: G,
    ) -> Self {
        Self {
            index,
            store,
            embedder,
            generator,
            history: None,
            top_k: DEFAULT_TOP_K,
            continuation_slack: DEFAULT_CONTINUATION_SLACK,
        }
    }

    #[inline]
    pub fn with_history(mut self, history: HistoryBuffer) -> Self {
        self.history = Some(history);
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_continuation_slack(mut self, slack: usize) -> Self {
        self.continuation_slack = slack;
        self
    }

    #[inline]
    pub fn vector_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn document_count(&self) -> usize {
        self.store.len()
    }

    /// Answer a query with one blocking generation call and report whether
    /// the caller should continue.
    ///
    /// Continuation is a length heuristic, not a semantic truncation
    /// detector: a response within `continuation_slack` of the token budget
    /// is treated as truncated. It can both fire on naturally long answers
    /// and miss short truncations; the behavior is kept as-is because callers
    /// depend on it.
    #[inline]
    pub fn answer(&self, request: &RagRequest) -> Result<RagAnswer> {
        let prompt_text = request
            .continuation_token
            .as_deref()
            .unwrap_or(&request.prompt);

        let full_prompt = self.prepare_prompt(prompt_text)?;

        let generated = self.generator.generate(&GenerateRequest {
            model: request.model.clone(),
            prompt: full_prompt,
            max_tokens: request.max_tokens,
        })?;

        let threshold = (request.max_tokens as usize).saturating_sub(self.continuation_slack);
        let needs_continue = generated.len() >= threshold;

        debug!(
            "Generated {} bytes (budget {}), continue={}",
            generated.len(),
            request.max_tokens,
            needs_continue
        );

        Ok(RagAnswer {
            continuation_token: needs_continue.then(|| generated.clone()),
            text: generated,
            needs_continue,
        })
    }

    /// Answer a query by consuming the generation service's fragment stream,
    /// concatenating fragments until the terminal marker.
    #[inline]
    pub fn answer_streaming(&self, request: &RagRequest) -> Result<String> {
        let prompt_text = request
            .continuation_token
            .as_deref()
            .unwrap_or(&request.prompt);

        let full_prompt = self.prepare_prompt(prompt_text)?;

        let fragments = self.generator.generate_stream(&GenerateRequest {
            model: request.model.clone(),
            prompt: full_prompt,
            max_tokens: request.max_tokens,
        })?;

        let mut accumulated = String::new();
        for fragment in fragments {
            accumulated.push_str(&fragment?);
        }

        Ok(accumulated.trim().to_string())
    }

    #[inline]
    pub fn clear_history(&self) -> Result<()> {
        if let Some(history) = &self.history {
            history.clear()?;
        }
        Ok(())
    }

    /// Embed the prompt text, retrieve the top-k chunks, and compose the
    /// final prompt. The retrieved context (not the eventual answer) is
    /// appended to history before generation runs, so history reflects every
    /// attempted retrieval even when generation later fails.
    fn prepare_prompt(&self, prompt_text: &str) -> Result<String> {
        let query_vector = self
            .embedder
            .embed(prompt_text)
            .context("Failed to embed query")?;

        let hits = self.index.search(&query_vector, self.top_k)?;
        let context = hits
            .iter()
            .map(|&(ordinal, _)| self.store.get(ordinal))
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            "Retrieved {} chunks ({} bytes of context)",
            hits.len(),
            context.len()
        );

        let history_contents = match &self.history {
            Some(history) => {
                let contents = history.read()?;
                history.append(&context)?;
                Some(contents)
            }
            None => None,
        };

        let full_prompt = match history_contents {
            Some(history) => format!(
                "Context:\n{context}\n\nHistory:\n{history}\n\nQuestion:\n{prompt_text}"
            ),
            None => format!("Context:\n{context}\n\nQuestion:\n{prompt_text}"),
        };

        debug!("Composed prompt of {} bytes", full_prompt.len());

        Ok(full_prompt)
    }
}
