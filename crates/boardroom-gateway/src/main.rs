//! Axum-based API gateway for the boardroom persona router.
//!
//! `POST /api/chat` forwards a conversation turn to the orchestrator and
//! returns either a JSON reply or, when `stream` is set, the reply as raw
//! text fragments with no end marker beyond connection close. `GET /health`
//! is the liveness check; `GET /debug/state` exposes the tail of a thread.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use boardroom_core::{
    ChatOutcome, ChatTurnRequest, CoreError, GatewayConfig, OpenAiBridge, Orchestrator,
    PersonaLibrary, ReplyBody, RetrievalResult, ThreadStore, Turn,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    config: Arc<GatewayConfig>,
    orchestrator: Arc<Orchestrator>,
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Option<Vec<Turn>>,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    persona: Option<String>,
}

#[derive(serde::Serialize)]
struct ChatResponse {
    reply: String,
    citations: Vec<RetrievalResult>,
    phase: String,
    thread_id: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is normal in container deployments.
        tracing::debug!("no .env loaded: {}", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let personas = match PersonaLibrary::load(config.prompts_file.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("persona prompts error: {}", e);
            std::process::exit(1);
        }
    };

    let store = match ThreadStore::open_path(&config.threads_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("thread store error at {}: {}", config.threads_path.display(), e);
            std::process::exit(1);
        }
    };

    let bridge = Arc::new(OpenAiBridge::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.model.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(bridge, store, personas));

    let bind = config.bind.clone();
    let app = build_app(AppState { config, orchestrator });

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("cannot bind {}: {}", bind, e);
            std::process::exit(1);
        }
    };
    tracing::info!("boardroom gateway listening on {}", bind);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}

fn build_app(state: AppState) -> Router {
    let cors = if state.config.cors_allow_any() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/debug/state", get(debug_state))
        .with_state(state)
        .layer(cors)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Map a core error onto the `{detail}` error contract.
fn error_response(e: CoreError) -> (StatusCode, Json<serde_json::Value>) {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        match e {
            CoreError::Provider { .. } | CoreError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    (status, Json(serde_json::json!({ "detail": e.to_string() })))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "detail": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let outcome = state
        .orchestrator
        .handle(ChatTurnRequest {
            thread_id: req.thread_id,
            message: req.message,
            history_override: req.history,
            persona_hint: req.persona,
            system_prompt: req.system_prompt,
            stream: req.stream,
        })
        .await;

    match outcome {
        Ok(ChatOutcome { thread_id, phase, body: ReplyBody::Full(reply), citations }) => Json(ChatResponse {
            reply,
            citations,
            phase: phase.to_string(),
            thread_id,
        })
        .into_response(),
        Ok(ChatOutcome { body: ReplyBody::Fragments(rx), .. }) => {
            // Raw text fragments; an errored fragment tears the connection down.
            let stream = ReceiverStream::new(rx).map(|fragment| match fragment {
                Ok(text) => Ok(Bytes::from(text)),
                Err(e) => Err(axum::Error::new(e)),
            });
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(serde::Deserialize)]
struct DebugStateQuery {
    #[serde(default)]
    thread_id: Option<String>,
}

/// Tail of a thread's stored turns, for manual inspection during development.
async fn debug_state(
    State(state): State<AppState>,
    Query(q): Query<DebugStateQuery>,
) -> Response {
    let thread_id = q.thread_id.as_deref().unwrap_or("default").to_string();
    match state.orchestrator.store().tail(&thread_id, 6) {
        Ok(turns) => Json(serde_json::json!({
            "thread_id": thread_id,
            "messages_tail": turns,
        }))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
