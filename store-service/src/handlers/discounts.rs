use crate::dtos::catalog::{
    CreateGlobalDiscountRequest, CreatedGlobalDiscount, DeactivatedGlobalDiscount,
    GlobalDiscountDto, ProductDiscountRequest, ProductDto, UpdateGlobalDiscountRequest,
};
use crate::handlers::catalog::check_product_discount;
use crate::handlers::object_id;
use crate::models::DiscountStatus;
use crate::services::discounts::GlobalDiscountUpdate;
use crate::startup::AppState;
use crate::utils::pagination::{PageQuery, Paginated, DEFAULT_LIMIT};
use crate::utils::validation::invalid;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

const DISCOUNT_NOT_FOUND: &str = "Global discount not found";

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!(DISCOUNT_NOT_FOUND))
}

fn check_percentage(percentage: f64) -> Result<(), AppError> {
    if (0.0..=100.0).contains(&percentage) {
        Ok(())
    } else {
        Err(invalid("discountPercentage", "must be between 0 and 100"))
    }
}

pub async fn list_global_discounts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page_no, limit) = page.resolve(DEFAULT_LIMIT);
    let discounts = state
        .discounts
        .list_global(page.skip(DEFAULT_LIMIT), limit as i64)
        .await?;

    Ok(Json(Paginated {
        response: discounts.iter().map(GlobalDiscountDto::from).collect(),
        page: page_no,
        limit,
    }))
}

pub async fn get_global_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = object_id(&discount_id, DISCOUNT_NOT_FOUND)?;
    let discount = state.discounts.get_global(id).await?.ok_or_else(not_found)?;
    Ok(Json(GlobalDiscountDto::from(&discount)))
}

#[axum::debug_handler]
pub async fn create_global_discount(
    State(state): State<AppState>,
    Json(req): Json<CreateGlobalDiscountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(percentage), Some(end_date)) = (req.discount_percentage, req.end_date) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount percentage and end date are required"
        )));
    };
    check_percentage(percentage)?;

    let now = Utc::now();
    if end_date <= now {
        return Err(invalid("endDate", "must be in the future"));
    }
    let start_date = req.start_date.unwrap_or(now);

    let (discount, scheduled_reset) = state
        .discounts
        .create_global(percentage, start_date, end_date)
        .await?;

    tracing::info!(
        discount_id = %discount.id,
        job = %scheduled_reset.job_name,
        cron = %scheduled_reset.cron_expression,
        "Global discount created"
    );
    Ok((
        StatusCode::CREATED,
        Json(CreatedGlobalDiscount {
            discount: GlobalDiscountDto::from(&discount),
            scheduled_reset,
        }),
    ))
}

pub async fn update_global_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<String>,
    Json(req): Json<UpdateGlobalDiscountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = object_id(&discount_id, DISCOUNT_NOT_FOUND)?;

    if let Some(percentage) = req.discount_percentage {
        check_percentage(percentage)?;
    }
    let status = req
        .status
        .as_deref()
        .map(|s| s.parse::<DiscountStatus>().map_err(|e| invalid("status", e)))
        .transpose()?;

    let update = GlobalDiscountUpdate {
        discount_percentage: req.discount_percentage,
        start_date: req.start_date,
        end_date: req.end_date,
        status,
    };
    let discount = state
        .discounts
        .update_global(id, update)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(GlobalDiscountDto::from(&discount)))
}

pub async fn delete_global_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = object_id(&discount_id, DISCOUNT_NOT_FOUND)?;
    let (discount, products_updated) = state
        .discounts
        .deactivate_global(id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(DeactivatedGlobalDiscount {
        message: "Global discount deactivated successfully",
        discount: GlobalDiscountDto::from(&discount),
        products_updated,
    }))
}

pub async fn set_product_discount(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(req): Json<ProductDiscountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(percentage), Some(expiry)) = (req.discount_percentage, req.discount_expiry) else {
        return Err(AppError::BadRequest(anyhow::anyhow!("Missing required fields")));
    };
    check_product_discount(percentage, expiry)?;

    let product = state
        .discounts
        .apply_product_discount(&product_id, percentage, expiry)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(ProductDto::from(&product)))
}
