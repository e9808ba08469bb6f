use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_order::{OrderError, RepoError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    BadGatewayError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Map the domain error taxonomy onto HTTP semantics: table violations
    /// and bad input are the client's problem, a lost CAS race is a
    /// conflict, and a courier failure is an upstream (502) failure.
    pub fn from_order(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => AppError::NotFoundError(format!("Order not found: {id}")),
            OrderError::InvalidTransition { .. } => AppError::ValidationError(err.to_string()),
            OrderError::Validation(msg) => AppError::ValidationError(msg),
            OrderError::Conflict { .. } => AppError::ConflictError(err.to_string()),
            OrderError::ShipmentCreationFailed(msg) => AppError::BadGatewayError(format!(
                "{msg}; the order was not moved, retry once the courier recovers"
            )),
            OrderError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }

    pub fn from_repo(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => AppError::NotFoundError(format!("Order not found: {id}")),
            RepoError::Conflict { .. } => AppError::ConflictError(err.to_string()),
            RepoError::Backend(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGatewayError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
