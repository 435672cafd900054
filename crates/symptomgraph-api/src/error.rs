use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use symptomgraph_core::SymptomGraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Traversal(#[from] SymptomGraphError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Traversal(SymptomGraphError::RootNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Traversal(SymptomGraphError::Canceled) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Traversal(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
