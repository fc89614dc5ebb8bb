use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::gemini::{GeminiClient, LlmError};
use crate::session::{refine, ChatSession};

/// The credential gate. Locked until a non-empty API key arrives; the key is
/// never validated against the remote service here, a bad key only shows up
/// on the first model call.
pub enum Gate {
    Locked,
    Open { client: GeminiClient, session: ChatSession },
}

/// Shared application state. The mutex around the gate also serializes sends
/// against the single conversation session.
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    persona: Arc<String>,
    llm_base_url: Arc<String>,
    model: Arc<String>,
    timeout: Option<Duration>,
    gate: Arc<Mutex<Gate>>,
}

impl AppState {
    /// `persona` is the full persona instruction with the inventory context
    /// already embedded; it stays frozen for the life of the process.
    pub fn new(
        persona: String,
        llm_base_url: String,
        model: String,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let templates = create_minijinja_env().context("Failed to initialize template engine")?;
        Ok(Self {
            templates: Arc::new(templates),
            persona: Arc::new(persona),
            llm_base_url: Arc::new(llm_base_url),
            model: Arc::new(model),
            timeout,
            gate: Arc::new(Mutex::new(Gate::Locked)),
        })
    }
}

// Minijinja Environment setup, with auto-reload for development convenience.
fn create_minijinja_env() -> Result<AutoReloader> {
    let reloader = AutoReloader::new(|notifier| {
        let loader = path_loader("templates");
        let mut env = Environment::new();
        env.set_loader(loader);
        notifier.watch_path("templates", true);
        Ok(env)
    });
    Ok(reloader)
}

fn error_body(kind: &'static str, message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": kind, "message": message.into() }))
}

fn llm_error_response(err: &LlmError) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_GATEWAY, error_body(err.kind(), err.to_string()))
}

async fn index_handler(
    State(state): State<AppState>,
) -> Result<Html<String>, Html<String>> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "Inventory Assistant Chatbot",
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

async fn state_handler(State(state): State<AppState>) -> Json<Value> {
    let gate = state.gate.lock().await;
    match &*gate {
        Gate::Locked => Json(json!({ "authenticated": false, "transcript": [] })),
        Gate::Open { session, .. } => {
            Json(json!({ "authenticated": true, "transcript": session.transcript() }))
        }
    }
}

#[derive(Deserialize)]
struct CredentialRequest {
    key: String,
}

async fn credential_handler(
    State(state): State<AppState>,
    Json(request): Json<CredentialRequest>,
) -> (StatusCode, Json<Value>) {
    let key = request.key.trim().to_string();
    if key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("invalid_credential", "API key must not be empty"),
        );
    }

    let mut gate = state.gate.lock().await;
    if let Gate::Locked = &*gate {
        let client = match GeminiClient::new(
            state.llm_base_url.as_str(),
            key,
            state.model.as_str(),
            state.timeout,
        ) {
            Ok(client) => client,
            Err(err) => {
                error!("Failed to construct model client: {}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body(err.kind(), err.to_string()),
                );
            }
        };
        *gate = Gate::Open {
            client,
            session: ChatSession::new(state.persona.as_ref().clone()),
        };
        info!("Credential accepted, chat session created");
    }
    (StatusCode::OK, Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct MessageRequest {
    text: String,
}

async fn message_handler(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> (StatusCode, Json<Value>) {
    let mut gate = state.gate.lock().await;
    let Gate::Open { client, session } = &mut *gate else {
        return (
            StatusCode::UNAUTHORIZED,
            error_body("needs_credential", "Enter an API key before chatting"),
        );
    };

    let raw = match session.send(client, &request.text).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!("Model call failed: {}", err);
            return llm_error_response(&err);
        }
    };

    match refine(client, &request.text, &raw).await {
        Ok(polished) => (StatusCode::OK, Json(json!({ "reply": polished }))),
        Err(err) => {
            warn!("Refinement call failed: {}", err);
            llm_error_response(&err)
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/state", get(state_handler))
        .route("/api/credential", post(credential_handler))
        .route("/api/message", post(message_handler))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
