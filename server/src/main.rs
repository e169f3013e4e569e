mod config;
mod gateway;
mod intent;
mod keywords;
mod knowledge;
mod prompt;
mod quick;
mod reply;
mod session;
mod text;

use crate::config::Config;
use crate::gateway::{Completion, GatewayError, ModelGateway};
use crate::intent::SiteLinks;
use crate::knowledge::KnowledgeBase;
use crate::reply::{ReplyContext, ReplyPipeline};
use crate::session::{SessionSigner, SessionStore};
use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Datelike;
use dotenvy::Error as DotenvError;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Mutex;
use tower::service_fn;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const MESSAGE_FIELDS: [&str; 7] = ["message", "text", "content", "prompt", "msg", "q", "question"];
const WIDGET_FILE: &str = "widget.html";
const FALLBACK_WIDGET: &str = "<!doctype html><html lang=\"fr\"><head><meta charset=\"utf-8\"><title>Betty</title></head><body><p>Betty est prête à discuter : envoyez vos messages sur <code>POST /chat</code>.</p></body></html>";

struct AppState {
    knowledge: KnowledgeBase,
    completion: Arc<dyn Completion>,
    pipeline: ReplyPipeline,
    sessions: Mutex<SessionStore>,
    signer: SessionSigner,
    static_dir: PathBuf,
    current_month: fn() -> u32,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("Message manquant")]
    MissingMessage,
    #[error("Corps JSON invalide : {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0}")]
    Upstream(#[from] GatewayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingMessage | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_files();
    configure_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    let knowledge = KnowledgeBase::load(&config.faq_path, &config.knowledge_dirs);
    let gateway = ModelGateway::new(&config.model).context("Failed to build the model client")?;

    info!(
        target: "config",
        provider = config.model.provider.as_str(),
        model = %config.model.model,
        fallback = config.model.fallback_model.as_deref().unwrap_or("none"),
        timeout_secs = config.model.timeout.as_secs(),
        promo_month = ?config.promo_month,
        faq_entries = knowledge.faq_len(),
        msg = "model gateway configured"
    );

    let state = Arc::new(AppState::new(&config, knowledge, Arc::new(gateway)));
    let router = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT combination")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind TCP listener")?;
    let bound = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(
        listening = %bound,
        commit = option_env!("GIT_COMMIT_HASH").unwrap_or("unknown"),
        msg = "server ready"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

impl AppState {
    fn new(config: &Config, knowledge: KnowledgeBase, completion: Arc<dyn Completion>) -> Self {
        Self {
            knowledge,
            completion,
            pipeline: ReplyPipeline::new(
                SiteLinks::new(&config.site_base_url),
                config.cta_policy,
                config.promo_month,
                config.nudge_every,
            ),
            sessions: Mutex::new(SessionStore::new(config.session_ttl)),
            signer: SessionSigner::new(&config.session_secret),
            static_dir: config.static_dir.clone(),
            current_month: local_month,
        }
    }
}

fn local_month() -> u32 {
    chrono::Local::now().month()
}

fn build_router(state: Arc<AppState>) -> Router {
    let static_root = Arc::new(state.static_dir.clone());
    let static_service = service_fn(move |req: Request<Body>| {
        let dir = ServeDir::new(static_root.as_ref().clone());
        async move {
            match dir.oneshot(req).await {
                Ok(response) => Ok::<Response, Infallible>(response.into_response()),
                Err(err) => Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Static file error: {err}"),
                )
                    .into_response()),
            }
        }
    });

    Router::new()
        .route("/", get(handle_home))
        .route("/chat", post(handle_chat))
        .route("/ask", post(handle_chat))
        .route("/bot", post(handle_chat))
        .route("/healthz", get(healthz))
        .with_state(state)
        .fallback_service(static_service)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("msg" = "shutdown signal received");
}

fn configure_tracing() {
    let default_filter = "info";
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn load_env_files() {
    fn load(file: &str) {
        match dotenvy::from_filename(file) {
            Ok(_) => {}
            Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => eprintln!("Warning: unable to load {file}: {err}"),
        }
    }

    load(".env.local");
    load(".env");
}

async fn healthz() -> &'static str {
    "OK"
}

/// Serves the widget page and starts the visitor's count over.
async fn handle_home(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session_id = state
        .signer
        .session_from_headers(&headers)
        .unwrap_or_else(|| state.signer.issue());
    let active_sessions = {
        let mut sessions = state.sessions.lock().await;
        sessions.reset(&session_id, Instant::now());
        sessions.len()
    };
    info!(target: "chat", active_sessions, "session counter reset");

    let page = tokio::fs::read_to_string(state.static_dir.join(WIDGET_FILE))
        .await
        .unwrap_or_else(|_| FALLBACK_WIDGET.to_string());

    let mut response = Html(page).into_response();
    state.signer.attach(response.headers_mut(), &session_id);
    response
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)?
    };
    let message = extract_message(&payload).ok_or(ApiError::MissingMessage)?;

    let known_session = state.signer.session_from_headers(&headers);
    let session_id = known_session
        .clone()
        .unwrap_or_else(|| state.signer.issue());
    let message_count = {
        let mut sessions = state.sessions.lock().await;
        let now = Instant::now();
        let mut session = sessions.load(&session_id, now);
        session.record_message();
        sessions.store(&session_id, session, now);
        session.message_count()
    };

    let month = (state.current_month)();
    let promo_active = state.pipeline.promo_active(month);

    let raw = match quick::quick_answer(message, &state.knowledge, promo_active) {
        Some(answer) => {
            info!(
                target: "chat",
                message_count,
                quick_answer = answer.kind(),
                "canned answer used"
            );
            answer.into_text()
        }
        None => {
            let system_prompt = prompt::system_prompt(&state.knowledge, promo_active);
            match state.completion.complete(&system_prompt, message).await {
                Ok(answer) => {
                    info!(
                        target: "chat",
                        message_count,
                        model = %answer.model,
                        "model answer received"
                    );
                    answer.text
                }
                Err(err) => {
                    error!(
                        target: "chat",
                        backend_error = %err,
                        message_count,
                        "completion failed"
                    );
                    return Err(ApiError::Upstream(err));
                }
            }
        }
    };

    let reply = state.pipeline.finish(
        &raw,
        &ReplyContext {
            user_text: message,
            message_count,
            month,
        },
    );

    let mut response = Json(ChatResponse { reply }).into_response();
    if known_session.is_none() {
        state.signer.attach(response.headers_mut(), &session_id);
    }
    Ok(response)
}

/// First non-blank string among the accepted message field names.
fn extract_message(payload: &Value) -> Option<&str> {
    MESSAGE_FIELDS.iter().find_map(|field| {
        payload
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    })
}
