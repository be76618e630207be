use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use http::{header, StatusCode};
use tracing::info;

use crate::error::AppError;
use crate::route::AppState;

pub const PATH: &str = "/whip";

pub fn route() -> Router<AppState> {
    Router::new().route(PATH, post(whip).fallback(method_not_allowed))
}

async fn whip(State(state): State<AppState>, body: Body) -> crate::result::Result<Response> {
    let body = to_bytes(body, state.config.http.max_offer_bytes)
        .await
        .map_err(AppError::body_unreadable)?;
    let offer = String::from_utf8(body.to_vec()).map_err(AppError::body_unreadable)?;

    let session = state
        .negotiator
        .negotiate(offer, state.ingestor.clone())
        .await
        .map_err(AppError::Negotiation)?;
    let id = session.id().to_string();
    let answer = session.detach(state.registry.clone()).await;
    info!("[{}] WHIP session established", id);

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header(header::CONTENT_TYPE, "application/sdp")
        .body(Body::from(answer))?)
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "invalid method")
}
