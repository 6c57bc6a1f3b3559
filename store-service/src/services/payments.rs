//! Order settlement driven by verified Stripe webhook events.

use crate::models::{CustomerInfo, Order, PaymentStatus, ShippingAddress};
use crate::services::error::StoreError;
use crate::services::inventory::{stock_requests, Inventory};
use crate::services::metrics::record_webhook_event;
use crate::services::orders::{OrderRepository, PaymentInfoUpdate};
use crate::services::stripe::{
    Charge, CheckoutSession, CustomerDetails, PaymentIntent, StripeClient, WebhookEvent,
};
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;

#[derive(Clone)]
pub struct PaymentEvents {
    orders: OrderRepository,
    inventory: Inventory,
    stripe: StripeClient,
}

/// Order id carried in provider metadata.
fn metadata_order_id(metadata: &HashMap<String, String>) -> Option<ObjectId> {
    metadata
        .get("orderId")
        .and_then(|id| ObjectId::parse_str(id).ok())
}

/// Checkout details override the stored contact fields; absent values keep what the order had.
pub fn merge_customer_details(
    order: &Order,
    details: &CustomerDetails,
) -> (CustomerInfo, ShippingAddress) {
    let current = &order.customer_info;
    let customer = CustomerInfo {
        full_name: details.name.clone().unwrap_or_else(|| current.full_name.clone()),
        email: details.email.clone().unwrap_or_else(|| current.email.clone()),
        phone_number: details
            .phone
            .clone()
            .unwrap_or_else(|| current.phone_number.clone()),
    };

    let shipping = match &details.address {
        Some(address) => ShippingAddress {
            street_address: address.line1.clone().unwrap_or_default(),
            apartment: Some(address.line2.clone().unwrap_or_default()),
            city: address.city.clone().unwrap_or_default(),
            province: address.state.clone().unwrap_or_default(),
            postal_code: address.postal_code.clone().unwrap_or_default(),
            country: address.country.clone().unwrap_or_default(),
        },
        None => order.shipping_address.clone(),
    };

    (customer, shipping)
}

impl PaymentEvents {
    pub fn new(orders: OrderRepository, inventory: Inventory, stripe: StripeClient) -> Self {
        Self {
            orders,
            inventory,
            stripe,
        }
    }

    /// Applies one event. Failures are reported to the caller, which acknowledges regardless.
    pub async fn handle(&self, event: &WebhookEvent) -> Result<(), StoreError> {
        tracing::info!(event_type = %event.event_type, event_id = ?event.id, "Webhook received");

        let result = match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                let intent: PaymentIntent = event.object()?;
                self.payment_intent_succeeded(&intent).await
            }
            "payment_intent.payment_failed" => {
                let intent: PaymentIntent = event.object()?;
                self.mark_failed(metadata_order_id(&intent.metadata)).await
            }
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                let session: CheckoutSession = event.object()?;
                self.checkout_completed(&session).await
            }
            "checkout.session.async_payment_failed" => {
                let session: CheckoutSession = event.object()?;
                self.mark_failed(metadata_order_id(&session.metadata)).await
            }
            "charge.succeeded" => {
                let charge: Charge = event.object()?;
                self.charge_succeeded(&charge).await
            }
            "charge.failed" => {
                let charge: Charge = event.object()?;
                self.charge_failed(&charge).await
            }
            other => {
                tracing::info!(event_type = %other, "Unhandled event type");
                record_webhook_event(other, "ignored");
                return Ok(());
            }
        };

        record_webhook_event(
            &event.event_type,
            if result.is_ok() { "processed" } else { "error" },
        );
        result
    }

    async fn payment_intent_succeeded(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let order_id = metadata_order_id(&intent.metadata)
            .ok_or_else(|| StoreError::Invalid("No orderId found in payment intent metadata".to_string()))?;
        let order = self.orders.find(order_id).await?.ok_or(StoreError::OrderNotFound)?;

        if order.payment_status == PaymentStatus::Paid {
            tracing::info!(order_id = %order.id, "Order already paid, skipping");
            return Ok(());
        }

        self.settle(&order).await?;

        if let Some(method_id) = intent.payment_method.as_deref() {
            self.record_card(order.id, method_id, None).await;
        }
        Ok(())
    }

    async fn checkout_completed(&self, session: &CheckoutSession) -> Result<(), StoreError> {
        let Some(order_id) = metadata_order_id(&session.metadata) else {
            tracing::error!(session_id = %session.id, "No orderId found in session metadata");
            return Ok(());
        };
        let order = self.orders.find(order_id).await?.ok_or(StoreError::OrderNotFound)?;

        if order.payment_status == PaymentStatus::Paid {
            tracing::info!(order_id = %order.id, "Order already paid, skipping");
            return Ok(());
        }

        self.settle(&order).await?;

        if let Some(details) = &session.customer_details {
            let (customer, shipping) = merge_customer_details(&order, details);
            self.orders.update_contact(order.id, &customer, &shipping).await?;
        }

        if let Some(intent_id) = session.payment_intent.as_deref() {
            match self.stripe.retrieve_payment_intent(intent_id).await {
                Ok(intent) => {
                    if let Some(method_id) = intent.payment_method.as_deref() {
                        self.record_card(order.id, method_id, Some(intent_id)).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Could not retrieve payment intent");
                }
            }
        }
        Ok(())
    }

    /// Reserves stock and flips the order to PAID/PROCESSING, undoing the reservation
    /// if the status write fails.
    async fn settle(&self, order: &Order) -> Result<(), StoreError> {
        let order_type = if order.user.is_some() { "user" } else { "guest" };
        let items = stock_requests(&order.order_items);

        let reserved = match self.inventory.reserve(&items).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, order_type, "Inventory reserved for paid order");
                true
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, order_type, error = %e, "Failed to reserve inventory");
                false
            }
        };

        match self.orders.mark_paid(order.id).await {
            Ok(Some(_)) => Ok(()),
            outcome => {
                if reserved {
                    if let Err(e) = self.inventory.release(&items).await {
                        tracing::error!(order_id = %order.id, error = %e, "Failed to release inventory after status update failure");
                    }
                }
                match outcome {
                    Err(e) => Err(e.into()),
                    _ => Err(StoreError::OrderNotFound),
                }
            }
        }
    }

    async fn record_card(&self, order_id: ObjectId, method_id: &str, intent_id: Option<&str>) {
        let method = match self.stripe.retrieve_payment_method(method_id).await {
            Ok(method) => method,
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Could not retrieve payment method");
                return;
            }
        };

        let Some(last4) = method.card.and_then(|c| c.last4) else {
            return;
        };

        let update = PaymentInfoUpdate {
            last_four_digits: Some(last4),
            stripe_payment_intent_id: intent_id.map(str::to_string),
            ..Default::default()
        };
        if let Err(e) = self.orders.update_payment_info(order_id, &update).await {
            tracing::error!(order_id = %order_id, error = %e, "Failed to store card details");
        }
    }

    async fn mark_failed(&self, order_id: Option<ObjectId>) -> Result<(), StoreError> {
        let Some(order_id) = order_id else {
            tracing::warn!("Failed payment event without an orderId");
            return Ok(());
        };
        self.orders.set_payment_status(order_id, PaymentStatus::Failed).await?;
        tracing::info!(order_id = %order_id, "Order payment failed");
        Ok(())
    }

    async fn charge_succeeded(&self, charge: &Charge) -> Result<(), StoreError> {
        let Some(intent_id) = charge.payment_intent.as_deref() else {
            return Ok(());
        };
        if let Some(order) = self.orders.find_by_payment_intent(intent_id).await? {
            self.orders.set_payment_status(order.id, PaymentStatus::Paid).await?;
            tracing::info!(order_id = %order.id, "Payment confirmed by charge");
        }
        Ok(())
    }

    async fn charge_failed(&self, charge: &Charge) -> Result<(), StoreError> {
        let Some(intent_id) = charge.payment_intent.as_deref() else {
            return Ok(());
        };
        let Some(order) = self.orders.find_by_payment_intent(intent_id).await? else {
            return Ok(());
        };

        if order.payment_status == PaymentStatus::Paid {
            match self.inventory.release(&stock_requests(&order.order_items)).await {
                Ok(()) => tracing::info!(order_id = %order.id, "Inventory released after charge failure"),
                Err(e) => tracing::error!(order_id = %order.id, error = %e, "Failed to release inventory"),
            }
        }

        self.orders.set_payment_status(order.id, PaymentStatus::Failed).await?;
        tracing::info!(order_id = %order.id, "Order payment failed via charge");
        Ok(())
    }
}
