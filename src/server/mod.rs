
use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::ollama::{EmbeddingProvider, GenerationProvider};
use crate::query::{QueryOrchestrator, RagRequest};

/// Build the HTTP router over a shared orchestrator.
#[inline]
pub fn router<E, G>(orchestrator: Arc<QueryOrchestrator<E, G>>) -> Router
where
    E: EmbeddingProvider + 'static,
    G: GenerationProvider + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<E, G>))
        .route("/rag", post(rag_handler::<E, G>))
        .route("/clear_history", post(clear_history_handler::<E, G>))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(orchestrator)
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn start_server<E, G>(
    addr: SocketAddr,
    orchestrator: Arc<QueryOrchestrator<E, G>>,
) -> Result<()>
where
    E: EmbeddingProvider + 'static,
    G: GenerationProvider + 'static,
{
    let app = router(orchestrator);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("RAG server listening on {addr}");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn health_handler<E, G>(
    State(orchestrator): State<Arc<QueryOrchestrator<E, G>>>,
) -> Json<Value>
where
    E: EmbeddingProvider + 'static,
    G: GenerationProvider + 'static,
{
    Json(json!({
        "status": "ok",
        "vectors": orchestrator.vector_count(),
        "documents": orchestrator.document_count(),
    }))
}

/// `POST /rag`: non-streaming requests answer with the continuation
/// handshake; `stream: true` requests consume the model's fragment stream
/// and answer with the accumulated text.
async fn rag_handler<E, G>(
    State(orchestrator): State<Arc<QueryOrchestrator<E, G>>>,
    Json(request): Json<RagRequest>,
) -> Response
where
    E: EmbeddingProvider + 'static,
    G: GenerationProvider + 'static,
{
    // The pipeline is synchronous blocking I/O end to end.
    let result = tokio::task::spawn_blocking(move || {
        if request.stream {
            orchestrator
                .answer_streaming(&request)
                .map(|answer| json!({ "answer": answer }))
        } else {
            orchestrator.answer(&request).and_then(|answer| {
                serde_json::to_value(answer).context("Failed to serialize answer")
            })
        }
    })
    .await;

    match result {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(e)) => {
            error!("Query failed: {e:#}");
            error_response(&e)
        }
        Err(e) => {
            error!("Query task panicked: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

async fn clear_history_handler<E, G>(
    State(orchestrator): State<Arc<QueryOrchestrator<E, G>>>,
) -> Response
where
    E: EmbeddingProvider + 'static,
    G: GenerationProvider + 'static,
{
    match orchestrator.clear_history() {
        Ok(()) => Json(json!({ "status": "History cleared" })).into_response(),
        Err(e) => {
            error!("Failed to clear history: {e:#}");
            error_response(&e)
        }
    }
}

// Upstream error messages are passed through to the caller verbatim.
fn error_response(error: &anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("{error:#}") })),
    )
        .into_response()
}
