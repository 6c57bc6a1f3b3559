use axum::{
    extract::{FromRequest, Request},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("static email regex")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+?251(9|7)|(09|07))[0-9]{8}$").expect("static phone regex"));

const NAME_FORBIDDEN: &str = "0123456789!@#$%^&*()_+={}[]:;\"'<>?,./`~";

/// JSON body that has passed `validator` checks. Malformed JSON and failed
/// rules both surface as 400 responses.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e.body_text())))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// Letters, spaces and hyphens only: no digits or punctuation.
pub fn is_alpha_name(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| NAME_FORBIDDEN.contains(c))
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Ethiopian mobile numbers, with or without the +251 prefix.
pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

pub fn invalid(field: &str, message: impl Into<String>) -> AppError {
    AppError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Length check in characters, reported like a schema violation.
pub fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min {
        return Err(invalid(field, format!("must be at least {} characters", min)));
    }
    if len > max {
        return Err(invalid(field, format!("must be at most {} characters", max)));
    }
    Ok(())
}
