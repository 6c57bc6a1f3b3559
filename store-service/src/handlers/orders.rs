use crate::dtos::order::{
    CheckoutRequest, CreateOrderRequest, GuestOrderRequest, OrderDto, UpdateOrderStatusRequest,
};
use crate::handlers::{failure, object_id};
use crate::middleware::CurrentUser;
use crate::models::order::to_cents;
use crate::models::{Order, OrderStatus, PaymentMethod};
use crate::services::inventory::{stock_requests, stock_transition, AvailabilityReport, StockTransition};
use crate::services::metrics::{record_order_created, record_webhook_event};
use crate::services::orders::PaymentInfoUpdate;
use crate::services::stripe::{CheckoutLineItem, CheckoutSession, CheckoutSessionRequest};
use crate::startup::AppState;
use crate::utils::pagination::{PageQuery, Paginated};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use mongodb::bson::{oid::ObjectId, Document};
use serde_json::json;
use service_core::error::AppError;

/// Order listings page in tens unless asked otherwise.
pub const ORDER_PAGE_LIMIT: u64 = 10;

const ORDER_NOT_FOUND: &str = "Order not found";
const UNAVAILABLE: &str = "Some products are unavailable or have insufficient inventory";
const STRIPE_SIGNATURE: &str = "stripe-signature";

fn unavailable(report: AvailabilityReport) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "message": UNAVAILABLE,
            "unavailableProducts": report.unavailable_products,
        })),
    )
        .into_response()
}

fn success_data(data: impl serde::Serialize) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

async fn load_order(state: &AppState, order_id: &str) -> Result<Option<Order>, AppError> {
    match ObjectId::parse_str(order_id) {
        Ok(id) => Ok(state.orders.find(id).await?),
        Err(_) => Ok(None),
    }
}

/// Stripe line items in cents. Guest sessions carry the item description,
/// account checkouts label each line with its product id.
pub fn checkout_line_items(order: &Order, label_with_product_id: bool) -> Vec<CheckoutLineItem> {
    order
        .order_items
        .iter()
        .map(|item| CheckoutLineItem {
            product_id: item.product.clone(),
            name: item.title.clone(),
            description: Some(if label_with_product_id {
                format!("Product ID: {}", item.product)
            } else {
                item.description.clone()
            }),
            unit_amount: to_cents(item.price),
            quantity: item.quantity,
            images: vec![item.image.clone()],
        })
        .collect()
}

async fn open_checkout(
    state: &AppState,
    order: &Order,
    success_url: String,
    cancel_url: String,
    order_type: &str,
    label_with_product_id: bool,
) -> Result<CheckoutSession, AppError> {
    let request = CheckoutSessionRequest {
        order_id: order.id.to_hex(),
        customer_email: Some(order.customer_info.email.clone()).filter(|e| !e.is_empty()),
        success_url,
        cancel_url,
        line_items: checkout_line_items(order, label_with_product_id),
        metadata: vec![("orderType".to_string(), order_type.to_string())],
    };
    let session = state.stripe.create_checkout_session(&request).await?;

    state
        .orders
        .update_payment_info(
            order.id,
            &PaymentInfoUpdate {
                stripe_payment_intent_id: session.payment_intent.clone(),
                stripe_checkout_session_id: Some(session.id.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok(session)
}

#[axum::debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, AppError> {
    req.check()?;

    // 1. Stock must cover every line
    let items = stock_requests(&req.order_items);
    let report = state.inventory.check_availability(&items).await?;
    if !report.all_available {
        return Ok(unavailable(report));
    }

    // 2. Persist
    let order = req.into_order()?;
    state.orders.create(&order).await?;

    // 3. Offline payments hold stock now; card payments wait for the webhook
    if order.payment_info.payment_method != PaymentMethod::Stripe {
        if let Err(e) = state.inventory.reserve(&items).await {
            tracing::warn!(order_id = %order.id, error = %e, "Reservation failed, discarding order");
            state.orders.delete(order.id).await?;
            return Ok(failure(StatusCode::BAD_REQUEST, e.to_string()));
        }
    }

    record_order_created(order.payment_info.payment_method.as_str());
    tracing::info!(order_id = %order.id, total = order.total, "Order created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": OrderDto::from(&order) })),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn create_guest_order(
    State(state): State<AppState>,
    Json(req): Json<GuestOrderRequest>,
) -> Result<Response, AppError> {
    if req.order_items.is_empty() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Order items are required"));
    }
    let Some(email) = req
        .customer_info
        .customer_email
        .clone()
        .filter(|e| !e.trim().is_empty())
    else {
        return Ok(failure(StatusCode::BAD_REQUEST, "Customer email is required"));
    };
    req.check()?;

    let report = state
        .inventory
        .check_availability(&stock_requests(&req.order_items))
        .await?;
    if !report.all_available {
        return Ok(unavailable(report));
    }

    let order = req.into_order(email);
    state.orders.create(&order).await?;
    record_order_created(order.payment_info.payment_method.as_str());
    tracing::info!(order_id = %order.id, total = order.total, "Guest order created");

    let checkout = &state.config.checkout;
    let session = open_checkout(
        &state,
        &order,
        checkout.success_url.clone(),
        checkout.cancel_url.clone(),
        "guest_checkout",
        false,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "response": {
                "stripe": { "checkoutUrl": session.url, "sessionId": session.id },
                "data": OrderDto::from(&order),
            },
            "message": "Guest order created. Proceed to checkout to complete the order.",
        })),
    )
        .into_response())
}

/// Acknowledges every authenticated event; processing errors are logged, not returned.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|value| value.to_str().ok());

    let event = match state.stripe.construct_event(
        &body,
        signature,
        state.config.environment.is_prod(),
        Utc::now().timestamp(),
    ) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook rejected");
            record_webhook_event("unknown", "rejected");
            return Ok(failure(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    if let Err(e) = state.payments.handle(&event).await {
        tracing::error!(event_type = %event.event_type, error = %e, "Webhook processing failed");
    }

    Ok(Json(json!({ "received": true })).into_response())
}

async fn paginated_orders(
    state: &AppState,
    user: Option<ObjectId>,
    page: &PageQuery,
) -> Result<Response, AppError> {
    let (page_no, limit) = page.resolve(ORDER_PAGE_LIMIT);
    let skip = page.skip(ORDER_PAGE_LIMIT);
    let orders = match user {
        Some(user) => state.orders.list_for_user(user, skip, limit).await?,
        None => state.orders.list(Document::new(), skip, limit).await?,
    };

    Ok(success_data(Paginated {
        response: orders.iter().map(OrderDto::from).collect::<Vec<_>>(),
        page: page_no,
        limit,
    }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    paginated_orders(&state, None, &page).await
}

pub async fn my_orders(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    paginated_orders(&state, Some(current.id()), &page).await
}

pub async fn user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    let user_id = object_id(&user_id, "User not found")?;
    paginated_orders(&state, Some(user_id), &page).await
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, AppError> {
    match load_order(&state, &order_id).await? {
        Some(order) => Ok(success_data(OrderDto::from(&order))),
        None => Ok(failure(StatusCode::NOT_FOUND, ORDER_NOT_FOUND)),
    }
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Response, AppError> {
    let Some(next) = req
        .order_status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok())
    else {
        return Ok(failure(StatusCode::BAD_REQUEST, "Invalid order status"));
    };

    let Some(order) = load_order(&state, &order_id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ORDER_NOT_FOUND));
    };

    let items = stock_requests(&order.order_items);
    match stock_transition(order.order_status, next) {
        StockTransition::Release => {
            if let Err(e) = state.inventory.release(&items).await {
                tracing::error!(order_id = %order.id, error = %e, "Failed to release stock; continuing");
            }
        }
        StockTransition::Reserve => {
            if let Err(e) = state.inventory.reserve(&items).await {
                return Ok(failure(
                    StatusCode::BAD_REQUEST,
                    format!("Cannot update order status: {}", e),
                ));
            }
        }
        StockTransition::Unchanged => {}
    }

    let Some(updated) = state.orders.set_order_status(order.id, next).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ORDER_NOT_FOUND));
    };

    tracing::info!(
        order_id = %order.id,
        from = order.order_status.as_str(),
        to = next.as_str(),
        "Order status changed"
    );
    Ok(success_data(OrderDto::from(&updated)))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, AppError> {
    let Some(order) = load_order(&state, &order_id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ORDER_NOT_FOUND));
    };

    let report = state
        .inventory
        .check_availability(&stock_requests(&order.order_items))
        .await?;
    if !report.all_available {
        return Ok(unavailable(report));
    }

    let info = &order.customer_info;
    let customer = state
        .stripe
        .create_customer(&info.email, &info.full_name, Some(info.phone_number.as_str()))
        .await?;

    let order_hex = order.id.to_hex();
    let intent = state
        .stripe
        .create_payment_intent(order.total_cents(), &[("orderId", order_hex.as_str())])
        .await?;

    state
        .orders
        .update_payment_info(
            order.id,
            &PaymentInfoUpdate {
                stripe_payment_intent_id: Some(intent.id.clone()),
                stripe_customer_id: Some(customer.id),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(json!({ "success": true, "clientSecret": intent.client_secret })).into_response())
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let (Some(success_url), Some(cancel_url)) = (
        req.success_url.filter(|u| !u.is_empty()),
        req.cancel_url.filter(|u| !u.is_empty()),
    ) else {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            "Success URL and cancel URL are required",
        ));
    };

    let Some(order) = load_order(&state, &order_id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ORDER_NOT_FOUND));
    };

    let report = state
        .inventory
        .check_availability(&stock_requests(&order.order_items))
        .await?;
    if !report.all_available {
        return Ok(unavailable(report));
    }

    let order_type = if order.user.is_some() {
        "user_checkout"
    } else {
        "guest_checkout"
    };
    let session = open_checkout(&state, &order, success_url, cancel_url, order_type, true).await?;

    Ok(Json(json!({
        "success": true,
        "checkoutUrl": session.url,
        "sessionId": session.id,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerInfo, OrderItem, PaymentInfo, PaymentStatus, ShippingAddress};

    fn order(items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        Order {
            id: ObjectId::new(),
            user: None,
            order_items: items,
            customer_info: CustomerInfo::default(),
            shipping_address: ShippingAddress::default(),
            payment_info: PaymentInfo::default(),
            subtotal: 0.0,
            shipping_cost: 0.0,
            tax: 0.0,
            discount: 0.0,
            total: 0.0,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            notes: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn line_items_are_in_cents() {
        let order = order(vec![OrderItem {
            product: "EID2224".to_string(),
            quantity: 3,
            price: 4.99,
            title: "Awaze".to_string(),
            image: "awaze.webp".to_string(),
            description: "Spicy paste".to_string(),
        }]);

        let guest = checkout_line_items(&order, false);
        assert_eq!(guest[0].unit_amount, 499);
        assert_eq!(guest[0].quantity, 3);
        assert_eq!(guest[0].description.as_deref(), Some("Spicy paste"));

        let account = checkout_line_items(&order, true);
        assert_eq!(account[0].description.as_deref(), Some("Product ID: EID2224"));
        assert_eq!(account[0].images, vec!["awaze.webp".to_string()]);
    }
}
