use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::session::NegotiationError;

#[derive(Debug)]
pub enum AppError {
    BodyUnreadable(String),
    Negotiation(NegotiationError),
    InternalServerError(anyhow::Error),
}

impl AppError {
    pub fn body_unreadable<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::BodyUnreadable(t.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BodyUnreadable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to read body").into_response()
            }
            AppError::Negotiation(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.step().describe()).into_response()
            }
            AppError::InternalServerError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError::InternalServerError(err.into())
    }
}
