use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Level};

use crate::config::Config;
use crate::engine::rtc::RtcEngine;
use crate::engine::SessionFactory;
use crate::ingest::sink::DirSinkFactory;
use crate::ingest::Ingestor;
use crate::route::{whip, AppState};
use crate::session::{Negotiator, Registry};

pub mod config;
pub mod engine;
pub mod ingest;
pub mod log;
pub mod session;

mod error;
mod result;
mod route;

pub use error::AppError;

/// Builds the HTTP surface on top of `factory`. Established sessions are
/// recorded in `registry`.
pub fn app(
    cfg: Config,
    factory: Arc<dyn SessionFactory>,
    registry: Registry,
) -> anyhow::Result<Router> {
    let cors = cfg.http.cors.layer()?;
    let app_state = AppState {
        negotiator: Arc::new(Negotiator::new(factory, cfg.session.gather_timeout())),
        ingestor: Arc::new(Ingestor::new(Arc::new(DirSinkFactory::new(&cfg.output.dir)))),
        registry,
        config: cfg,
    };
    Ok(whip::route()
        .with_state(app_state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        "http_request",
                        uri = ?request.uri(),
                        method = ?request.method(),
                    )
                })
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO))
                .on_failure(tower_http::trace::DefaultOnFailure::new().level(Level::INFO)),
        ))
}

/// Serves until `signal` resolves, then closes every session still open.
pub async fn serve<F>(
    cfg: Config,
    listener: TcpListener,
    factory: Arc<dyn SessionFactory>,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::fs::create_dir_all(&cfg.output.dir).await?;
    info!("Writing tracks to {}", cfg.output.dir.display());

    let registry = Registry::default();
    let app = app(cfg, factory, registry.clone())?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await;
    registry.close_all().await;
    Ok(result?)
}

pub async fn server_up<F>(cfg: Config, listener: TcpListener, signal: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let ice_servers = cfg.ice_servers.iter().cloned().map(Into::into).collect();
    let engine = match RtcEngine::new(ice_servers, cfg.session.include_loopback_candidates) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create WebRTC engine: {e}");
            return;
        }
    };
    serve(cfg, listener, Arc::new(engine), signal)
        .await
        .unwrap_or_else(|e| error!("Application error: {e}"));
}
