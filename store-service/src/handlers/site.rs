use crate::dtos::site::{
    AboutDto, AboutFields, AddressQuery, ContactDto, ContactRequest, ContentDto, ContentRequest,
    ImageDto, TextContentRequest,
};
use crate::handlers::bad_multipart;
use crate::models::{ContentType, ImageSize};
use crate::services::uploads::{allowed_extension, ABOUT_PHOTO_DIMENSIONS, INVALID_FILE_TYPE};
use crate::startup::AppState;
use crate::utils::validation::invalid;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;
use std::collections::HashMap;

/// Markup allowed in editable copy: ammonia's defaults plus `style` and
/// `class` on paragraphs and spans.
pub fn sanitize_html(raw: &str) -> String {
    ammonia::Builder::default()
        .add_tag_attributes("p", &["style", "class"])
        .add_tag_attributes("span", &["style", "class"])
        .clean(raw)
        .to_string()
}

#[derive(Debug)]
struct FilePart {
    file_name: String,
    data: Bytes,
}

/// Text parts keyed by name plus the one file part named `file_field`.
async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<(HashMap<String, String>, Option<FilePart>), AppError> {
    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(bad_multipart)?;
            file = Some(FilePart { file_name, data });
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            fields.insert(name, value);
        }
    }

    Ok((fields, file))
}

fn checked_image(file: Option<FilePart>, missing: &str) -> Result<FilePart, AppError> {
    let file = file.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(missing.to_string())))?;
    if allowed_extension(&file.file_name).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(INVALID_FILE_TYPE)));
    }
    Ok(file)
}

pub async fn save_content(
    State(state): State<AppState>,
    Json(req): Json<ContentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() {
        return Err(invalid("name", "is required"));
    }

    let clean = sanitize_html(&req.content);
    state
        .site
        .upsert_content(&req.name, &clean, req.alt.as_deref(), ContentType::Text)
        .await?;

    tracing::info!(name = %req.name, "Content saved");
    Ok(Json(json!({ "message": "Successfully Created" })))
}

pub async fn get_content(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let body = match state.site.find_content(&name).await? {
        Some(content) => json!(ContentDto::from(&content)),
        None => json!({}),
    };
    Ok(Json(body))
}

pub async fn save_text_content(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<TextContentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let clean = sanitize_html(&req.content);
    state
        .site
        .upsert_content(&name, &clean, req.alt.as_deref(), ContentType::Text)
        .await?;

    Ok(Json(json!({ "message": "saved" })))
}

pub async fn save_image_content(
    State(state): State<AppState>,
    Path(name): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (fields, file) = read_form(multipart, "content").await?;
    let file = checked_image(file, "Image is Required")?;

    let filename = state.uploads.save_original(&file.file_name, &file.data).await?;
    let content = state
        .site
        .upsert_content(
            &name,
            &filename,
            fields.get("alt").map(String::as_str),
            ContentType::Image,
        )
        .await?;

    Ok(Json(ContentDto::from(&content)))
}

#[axum::debug_handler]
pub async fn upload_image(
    State(state): State<AppState>,
    Path((size, name)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let size: ImageSize = size
        .parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?;

    // 1. Photo present with an accepted extension
    let (fields, file) = read_form(multipart, "photo").await?;
    let file = checked_image(file, "Image is Required")?;

    // 2. Re-encode to `{name}_{size}.webp`
    let stem = format!("{}_{}", name, size.as_str());
    let filename = state
        .uploads
        .save_webp(file.data.to_vec(), Some(&stem), size.dimensions())
        .await?;

    // 3. Record the slot
    state
        .site
        .upsert_image(&stem, size, &filename, fields.get("alt").map(String::as_str))
        .await?;

    Ok(Json(json!({ "message": filename })))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let image = state.site.find_image(&name).await?;
    Ok(Json(image.as_ref().map(ImageDto::from)))
}

#[axum::debug_handler]
pub async fn save_about(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (mut fields, file) = read_form(multipart, "aboutus_photo").await?;
    let file = checked_image(file, "Image is Required")?;
    let about = AboutFields {
        name: fields.remove("name").unwrap_or_default(),
        description: fields.remove("description").unwrap_or_default(),
        image_tag: fields.remove("image_tag").unwrap_or_default(),
    };
    about.check()?;

    let photo = state
        .uploads
        .save_webp(file.data.to_vec(), None, Some(ABOUT_PHOTO_DIMENSIONS))
        .await?;
    let saved = state
        .site
        .upsert_about(&about.name, &about.description, &photo, &about.image_tag)
        .await?;

    Ok(Json(AboutDto::from(&saved)))
}

pub async fn list_about(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let entries = state.site.list_about().await?;
    Ok(Json(entries.iter().map(AboutDto::from).collect::<Vec<_>>()))
}

pub async fn save_contact(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.check()?;
    let contact = state
        .site
        .upsert_contact(&req.description, &req.phone_number, &req.email, &req.location)
        .await?;
    Ok(Json(ContactDto::from(&contact)))
}

pub async fn get_contact(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let contact = state.site.find_contact().await?;
    Ok(Json(contact.as_ref().map(ContactDto::from)))
}

pub async fn search_address(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Json<Vec<Value>> {
    match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => Json(state.geocoder.search(term).await),
        None => Json(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_keeps_styling_and_drops_scripts() {
        let clean = sanitize_html(
            r#"<p style="color:red" class="lead">Hi<script>alert(1)</script></p><span onclick="x()">s</span>"#,
        );
        assert!(clean.contains(r#"style="color:red""#));
        assert!(clean.contains(r#"class="lead""#));
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onclick"));
    }

    #[test]
    fn images_need_an_accepted_extension() {
        let missing = checked_image(None, "Image is Required").unwrap_err();
        assert_eq!(missing.to_string(), "Bad request: Image is Required");

        let svg = FilePart {
            file_name: "logo.svg".to_string(),
            data: Bytes::from_static(b"<svg/>"),
        };
        assert!(checked_image(Some(svg), "Image is Required").is_err());
    }
}
