use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::store::{ConstraintViolation, StockShortage};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for {} ingredient(s)", .0.len())]
    InsufficientStock(Vec<StockShortage>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ConstraintViolation>() {
            Ok(ConstraintViolation::Duplicate(what)) => {
                AppError::Conflict(format!("{what} already exists"))
            }
            Ok(violation) => AppError::Validation(violation.to_string()),
            Err(err) => AppError::Storage(err),
        }
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::InsufficientStock(missing) => json!({
                "error": "insufficient stock",
                "missing": missing,
            }),
            AppError::Storage(e) => {
                error!(error = ?e, "storage error");
                json!({ "error": "internal error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_kind_to_its_status() {
        assert_eq!(AppError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::not_found("recipe", Uuid::nil()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientStock(vec![]).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_violations_map_to_client_errors() {
        let dup = AppError::from(anyhow::Error::new(ConstraintViolation::Duplicate(
            "categories_name_key".into(),
        )));
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let missing = AppError::from(anyhow::Error::new(ConstraintViolation::MissingReference(
            "ingredients_category_id_fkey".into(),
        )));
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let range = AppError::from(anyhow::Error::new(ConstraintViolation::OutOfRange(
            "stock".into(),
        )));
        assert_eq!(range.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn storage_error_body_hides_the_cause() {
        let resp = AppError::from(anyhow::anyhow!("password authentication failed for user"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "internal error" }));
    }

    #[test]
    fn not_found_message_names_entity() {
        let id = Uuid::new_v4();
        let msg = AppError::not_found("ingredient", id).to_string();
        assert_eq!(msg, format!("ingredient {id} not found"));
    }
}
