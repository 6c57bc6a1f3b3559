pub mod access;
pub mod auth;
pub mod catalog;
pub mod discounts;
pub mod health;
pub mod orders;
pub mod site;
pub mod users;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use service_core::error::AppError;

/// Path ids that are not valid ObjectIds cannot match a document, so they
/// report the same 404 as a missing one.
pub(crate) fn object_id(raw: &str, not_found: &'static str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::NotFound(anyhow::anyhow!(not_found)))
}

pub(crate) fn parse_object_ids(raw: &[String]) -> Result<Vec<ObjectId>, AppError> {
    raw.iter()
        .map(|id| {
            ObjectId::parse_str(id)
                .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid id: {}", id)))
        })
        .collect()
}

/// `{success:false, message}` body used by the envelope-style endpoints.
pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "message": message.into() }))).into_response()
}

pub(crate) fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e.body_text()))
}

pub async fn not_found_fallback() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Route not found"))
}
