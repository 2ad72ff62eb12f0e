use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use correlation::{
    config::{LogFormat, ServerSettings},
    outbound::CorrelationExt as _,
    AppError, CorrelationConfig, CorrelationId, Settings,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::signal;
use tracing::info;

#[derive(Clone)]
struct AppState {
    config: Arc<CorrelationConfig>,
    client: reqwest::Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Settings file is optional; without one every default applies.
    let settings = match std::env::var("CORRELATION_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            Settings::load(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?
        }
        Err(_) => Settings::default(),
    };

    init_tracing(&settings.server);

    let config = Arc::new(settings.correlation_config());
    info!(
        port = settings.server.port,
        header = config.key(),
        "correlation-echo starting"
    );

    let state = AppState {
        config: Arc::clone(&config),
        client: reqwest::Client::new(),
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));

    let app = app(state).layer(trace_layer);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        server
            .log_level
            .as_deref()
            .unwrap_or("correlation=info,correlation_echo=info,tower_http=warn")
            .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match server.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/echo", get(echo))
        .route("/relay", get(relay))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            correlation::correlation_middleware,
        ))
        .with_state(state)
}

/// `GET /healthz` — always 200 with `{"status": "ok"}`.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /echo` — the resolved correlation ID and the header it travels in.
async fn echo(State(state): State<AppState>, Extension(id): Extension<CorrelationId>) -> Json<Value> {
    info!("echo");
    Json(json!({
        "correlation_id": id.as_str(),
        "header": state.config.key(),
    }))
}

#[derive(Debug, Deserialize)]
struct RelayQuery {
    url: String,
}

/// `GET /relay?url=...` — call `url` with the correlation ID forwarded.
///
/// This fetches any http(s) URL the caller names, so it is a local demo
/// only: the server binds loopback unless `[server] host` says otherwise.
async fn relay(
    State(state): State<AppState>,
    Extension(id): Extension<CorrelationId>,
    Query(query): Query<RelayQuery>,
) -> Result<Json<Value>, AppError> {
    let url = reqwest::Url::parse(&query.url).with_context(|| format!("invalid url {}", query.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow::anyhow!("unsupported url scheme `{}`", url.scheme()).into());
    }

    let upstream = state
        .client
        .get(url)
        .correlated(&id)
        .send()
        .await
        .with_context(|| format!("calling {}", query.url))?;

    info!(url = %query.url, status = upstream.status().as_u16(), "relayed");
    Ok(Json(json!({
        "correlation_id": id.as_str(),
        "upstream_status": upstream.status().as_u16(),
    })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
