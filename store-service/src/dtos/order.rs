use crate::models::{
    CustomerInfo, Order, OrderItem, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus,
    ShippingAddress,
};
use crate::utils::validation::{check_len, invalid};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

pub const DEFAULT_GUEST_PHONE: &str = "+14165557890";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: String,
    pub user: Option<String>,
    pub order_items: Vec<OrderItem>,
    pub customer_info: CustomerInfo,
    pub shipping_address: ShippingAddress,
    pub payment_info: PaymentInfo,
    pub subtotal: f64,
    pub shipping_cost: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_hex(),
            user: order.user.map(|u| u.to_hex()),
            order_items: order.order_items.clone(),
            customer_info: order.customer_info.clone(),
            shipping_address: order.shipping_address.clone(),
            payment_info: order.payment_info.clone(),
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            tax: order.tax,
            discount: order.discount,
            total: order.total,
            order_status: order.order_status,
            payment_status: order.payment_status,
            notes: order.notes.clone(),
            tracking_number: order.tracking_number.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Every line needs a positive quantity and a non-negative price.
fn check_items(items: &[OrderItem]) -> Result<(), AppError> {
    for item in items {
        if item.quantity < 1 {
            return Err(invalid(
                "orderItems.quantity",
                format!("quantity for {} must be at least 1", item.product),
            ));
        }
        if item.price < 0.0 || !item.price.is_finite() {
            return Err(invalid(
                "orderItems.price",
                format!("price for {} must not be negative", item.product),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfoInput {
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user: Option<String>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    pub customer_info: CustomerInfo,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_info: PaymentInfoInput,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub shipping_cost: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    pub total: Option<f64>,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    /// `total` when supplied and non-zero, otherwise derived from the components.
    pub fn resolved_total(&self) -> f64 {
        match self.total {
            Some(total) if total != 0.0 => total,
            _ => self.subtotal + self.shipping_cost + self.tax - self.discount,
        }
    }

    pub fn check(&self) -> Result<(), AppError> {
        if self.order_items.is_empty() {
            return Err(invalid("orderItems", "at least one item is required"));
        }
        check_items(&self.order_items)?;
        check_len("customerInfo.fullName", &self.customer_info.full_name, 2, 100)?;
        if let Some(notes) = &self.notes {
            check_len("notes", notes, 0, 500)?;
        }
        Ok(())
    }

    pub fn into_order(self) -> Result<Order, AppError> {
        let total = self.resolved_total();
        let user = match self.user.as_deref().filter(|u| !u.is_empty()) {
            Some(id) => Some(
                ObjectId::parse_str(id).map_err(|_| invalid("user", "is not a valid id"))?,
            ),
            None => None,
        };

        let now = Utc::now();
        Ok(Order {
            id: ObjectId::new(),
            user,
            order_items: self.order_items,
            customer_info: self.customer_info,
            shipping_address: self.shipping_address,
            payment_info: PaymentInfo {
                payment_method: self.payment_info.payment_method,
                ..Default::default()
            },
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax: self.tax,
            discount: self.discount,
            total,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            notes: self.notes,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestCustomerInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub customer_email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestShippingAddress {
    pub street_address: Option<String>,
    pub apartment: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub customer_info: GuestCustomerInfo,
    #[serde(default)]
    pub shipping_address: GuestShippingAddress,
    #[serde(default)]
    pub shipping_cost: f64,
    #[serde(default)]
    pub tax: f64,
}

impl GuestOrderRequest {
    pub fn check(&self) -> Result<(), AppError> {
        check_items(&self.order_items)?;
        if self.shipping_cost < 0.0 || self.tax < 0.0 {
            return Err(invalid("shippingCost", "shipping and tax must not be negative"));
        }
        Ok(())
    }

    /// Builds a STRIPE order; the subtotal is recomputed from the items.
    pub fn into_order(self, email: String) -> Order {
        let subtotal: f64 = self
            .order_items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum();
        let total = subtotal + self.shipping_cost + self.tax;

        let info = self.customer_info;
        let full_name = format!(
            "{} {}",
            info.first_name.unwrap_or_default(),
            info.last_name.unwrap_or_default()
        )
        .trim()
        .to_string();
        let address = self.shipping_address;

        let now = Utc::now();
        Order {
            id: ObjectId::new(),
            user: None,
            order_items: self.order_items,
            customer_info: CustomerInfo {
                full_name: if full_name.is_empty() {
                    "Guest Customer".to_string()
                } else {
                    full_name
                },
                email,
                phone_number: info
                    .phone_number
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| DEFAULT_GUEST_PHONE.to_string()),
            },
            shipping_address: ShippingAddress {
                street_address: address.street_address.unwrap_or_default(),
                apartment: Some(address.apartment.unwrap_or_default()),
                city: address.city.unwrap_or_default(),
                province: address.province.unwrap_or_default(),
                postal_code: address.postal_code.unwrap_or_default(),
                country: address.country.unwrap_or_default(),
            },
            payment_info: PaymentInfo::default(),
            subtotal,
            shipping_cost: self.shipping_cost,
            tax: self.tax,
            discount: 0.0,
            total,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            notes: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub order_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: i64) -> OrderItem {
        OrderItem {
            product: "EID2223".to_string(),
            quantity,
            price,
            title: "Mitmita".to_string(),
            image: "m.webp".to_string(),
            description: String::new(),
        }
    }

    fn create_request(total: Option<f64>) -> CreateOrderRequest {
        CreateOrderRequest {
            user: None,
            order_items: vec![item(10.0, 2)],
            customer_info: CustomerInfo {
                full_name: "Abebe Kebede".to_string(),
                email: "abebe@mail.com".to_string(),
                phone_number: "0912345678".to_string(),
            },
            shipping_address: ShippingAddress::default(),
            payment_info: PaymentInfoInput::default(),
            subtotal: 20.0,
            shipping_cost: 5.0,
            tax: 2.5,
            discount: 1.0,
            total,
            notes: None,
        }
    }

    #[test]
    fn total_is_derived_when_absent_or_zero() {
        assert_eq!(create_request(None).resolved_total(), 26.5);
        assert_eq!(create_request(Some(0.0)).resolved_total(), 26.5);
        assert_eq!(create_request(Some(30.0)).resolved_total(), 30.0);
    }

    #[test]
    fn empty_orders_and_zero_quantities_are_rejected() {
        let mut request = create_request(None);
        request.order_items[0].quantity = 0;
        assert!(request.check().is_err());

        request.order_items.clear();
        assert!(request.check().is_err());

        assert!(create_request(None).check().is_ok());
    }

    #[test]
    fn negative_prices_are_rejected() {
        let mut request = create_request(None);
        request.order_items[0].price = -1.0;
        assert!(matches!(
            request.check(),
            Err(AppError::InvalidField { ref field, .. }) if field == "orderItems.price"
        ));
    }

    fn guest_request(items: Vec<OrderItem>) -> GuestOrderRequest {
        GuestOrderRequest {
            order_items: items,
            customer_info: GuestCustomerInfo::default(),
            shipping_address: GuestShippingAddress::default(),
            shipping_cost: 0.0,
            tax: 0.0,
        }
    }

    #[test]
    fn guest_items_need_positive_quantities() {
        assert!(matches!(
            guest_request(vec![item(10.0, -3)]).check(),
            Err(AppError::InvalidField { ref field, .. }) if field == "orderItems.quantity"
        ));
        assert!(guest_request(vec![item(10.0, 0)]).check().is_err());
        assert!(guest_request(vec![item(-10.0, 1)]).check().is_err());
        assert!(guest_request(vec![item(10.0, 2)]).check().is_ok());
    }

    #[test]
    fn guest_order_fills_defaults() {
        let request = GuestOrderRequest {
            order_items: vec![item(4.5, 2), item(1.0, 1)],
            customer_info: GuestCustomerInfo {
                first_name: Some("Sara".to_string()),
                last_name: Some("Lee".to_string()),
                customer_email: Some("sara@mail.com".to_string()),
                phone_number: None,
            },
            shipping_address: GuestShippingAddress::default(),
            shipping_cost: 2.0,
            tax: 0.0,
        };

        let order = request.into_order("sara@mail.com".to_string());
        assert_eq!(order.subtotal, 10.0);
        assert_eq!(order.total, 12.0);
        assert_eq!(order.customer_info.full_name, "Sara Lee");
        assert_eq!(order.customer_info.phone_number, DEFAULT_GUEST_PHONE);
        assert_eq!(order.payment_info.payment_method, PaymentMethod::Stripe);
        assert_eq!(order.order_status, OrderStatus::Pending);
    }
}
