use crate::dtos::catalog::{ProductDiscountRequest, ProductDto, ProductForm, RemovedProduct};
use crate::handlers::bad_multipart;
use crate::services::uploads::{allowed_extension, INVALID_FILE_TYPE};
use crate::startup::AppState;
use crate::utils::pagination::{PageQuery, Paginated, SearchFields, DEFAULT_LIMIT};
use crate::utils::validation::invalid;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use mongodb::bson::doc;
use service_core::error::AppError;

pub const MAX_PRODUCT_IMAGES: usize = 10;

const PRODUCT_SEARCH: SearchFields = SearchFields {
    text: &["title", "description", "weightUnit"],
    numeric: &["price", "weight", "quantity", "discountPercentage"],
};

const PRODUCT_NOT_FOUND: &str = "Product not found";

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!(PRODUCT_NOT_FOUND))
}

struct ImageUpload {
    file_name: String,
    data: Bytes,
}

/// Splits a product form into text fields and image parts. File types and the
/// image count are checked before anything touches the disk.
async fn read_product_form(mut multipart: Multipart) -> Result<(ProductForm, Vec<ImageUpload>), AppError> {
    let mut form = ProductForm::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name.trim_end_matches("[]") == "images" {
            if uploads.len() == MAX_PRODUCT_IMAGES {
                return Err(invalid(
                    "images",
                    format!("no more than {} images are allowed", MAX_PRODUCT_IMAGES),
                ));
            }
            let file_name = field.file_name().unwrap_or_default().to_string();
            if allowed_extension(&file_name).is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(INVALID_FILE_TYPE)));
            }
            let data = field.bytes().await.map_err(bad_multipart)?;
            uploads.push(ImageUpload { file_name, data });
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            form.push(&name, value);
        }
    }

    Ok((form, uploads))
}

async fn store_images(state: &AppState, uploads: Vec<ImageUpload>) -> Result<Vec<String>, AppError> {
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        stored.push(state.uploads.save_original(&upload.file_name, &upload.data).await?);
    }
    Ok(stored)
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page_no, limit) = page.resolve(DEFAULT_LIMIT);
    let filter = page.filter(doc! { "status": "VISIBLE" }, PRODUCT_SEARCH);
    let products = state.products.list(filter, page.skip(DEFAULT_LIMIT), limit).await?;

    let now = Utc::now();
    Ok(Json(Paginated {
        response: products.iter().map(|p| ProductDto::at(p, now)).collect(),
        page: page_no,
        limit,
    }))
}

pub async fn top_deals(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = state.products.top_deals().await?;
    let now = Utc::now();
    Ok(Json(
        products.iter().map(|p| ProductDto::at(p, now)).collect::<Vec<_>>(),
    ))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .products
        .find_visible(&product_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ProductDto::from(&product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // 1. Parse and validate before writing anything
    let (form, uploads) = read_product_form(multipart).await?;
    if uploads.is_empty() {
        return Err(invalid("images", "at least one image is required"));
    }
    let fields = form.into_fields()?;

    if state.products.find_by_title(&fields.title).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Product title already exists")));
    }

    // 2. Persist images, then the product
    let images = store_images(&state, uploads).await?;
    let product_id = state.products.next_product_id().await?;
    let product = fields.into_product(product_id, images);
    state.products.create(&product).await?;

    Ok((StatusCode::CREATED, Json(ProductDto::from(&product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (form, uploads) = read_product_form(multipart).await?;
    let new_title = form.title.clone();
    let mut set = form.into_update()?;

    let existing = state.products.find(&product_id).await?.ok_or_else(not_found)?;
    if let Some(title) = new_title.filter(|t| *t != existing.title) {
        if state.products.find_by_title(&title).await?.is_some() {
            return Err(AppError::Conflict(anyhow::anyhow!("Product title already exists")));
        }
    }

    if !uploads.is_empty() {
        set.insert("images", store_images(&state, uploads).await?);
    }

    let product = state
        .products
        .update(&product_id, set)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(product_id = %product_id, "Product updated");
    Ok(Json(ProductDto::from(&product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.hide(&product_id).await?.ok_or_else(not_found)?;

    tracing::info!(product_id = %product_id, "Product hidden");
    Ok(Json(RemovedProduct {
        message: "Product removed successfully",
        product: ProductDto::from(&product),
    }))
}

pub async fn apply_product_discount(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(req): Json<ProductDiscountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(percentage), Some(expiry)) = (req.discount_percentage, req.discount_expiry) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount percentage and expiry date are required"
        )));
    };
    check_product_discount(percentage, expiry)?;

    let product = state
        .discounts
        .apply_product_discount(&product_id, percentage, expiry)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ProductDto::from(&product)))
}

pub async fn remove_product_discount(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .discounts
        .remove_product_discount(&product_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ProductDto::from(&product)))
}

/// Percentage in 0-100 and an expiry that has not already passed.
pub(crate) fn check_product_discount(
    percentage: f64,
    expiry: chrono::DateTime<Utc>,
) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&percentage) {
        return Err(invalid("discountPercentage", "must be between 0 and 100"));
    }
    if expiry <= Utc::now() {
        return Err(invalid("discountExpiry", "must be in the future"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn product_discount_bounds() {
        let tomorrow = Utc::now() + Duration::days(1);
        assert!(check_product_discount(25.0, tomorrow).is_ok());
        assert!(check_product_discount(0.0, tomorrow).is_ok());
        assert!(check_product_discount(100.5, tomorrow).is_err());
        assert!(check_product_discount(-1.0, tomorrow).is_err());
        assert!(check_product_discount(10.0, Utc::now() - Duration::minutes(5)).is_err());
    }
}
