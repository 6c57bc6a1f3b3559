use crate::models::{OrderItem, OrderStatus, Product, ProductStatus};
use crate::services::database::MongoDb;
use crate::services::error::StoreError;
use crate::services::metrics::record_inventory_operation;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A quantity of one product, keyed by public product id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockRequest {
    pub product: String,
    pub quantity: i64,
}

impl From<&OrderItem> for StockRequest {
    fn from(item: &OrderItem) -> Self {
        Self {
            product: item.product.clone(),
            quantity: item.quantity,
        }
    }
}

pub fn stock_requests(items: &[OrderItem]) -> Vec<StockRequest> {
    items.iter().map(StockRequest::from).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAvailability {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub requested_quantity: i64,
    pub available_quantity: i64,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub all_available: bool,
    pub availability_results: Vec<ItemAvailability>,
    pub unavailable_products: Vec<ItemAvailability>,
}

/// Compares requested quantities with the stock on hand (`product_id -> (title, quantity)`).
pub fn assess(items: &[StockRequest], stock: &HashMap<String, (String, i64)>) -> AvailabilityReport {
    let availability_results: Vec<ItemAvailability> = items
        .iter()
        .map(|item| match stock.get(&item.product) {
            None => ItemAvailability {
                product_id: item.product.clone(),
                title: None,
                requested_quantity: item.quantity,
                available_quantity: 0,
                is_available: false,
                error: Some("Product not found".to_string()),
            },
            Some((title, available)) => {
                let is_available = *available >= item.quantity;
                ItemAvailability {
                    product_id: item.product.clone(),
                    title: Some(title.clone()),
                    requested_quantity: item.quantity,
                    available_quantity: *available,
                    is_available,
                    error: (!is_available)
                        .then(|| format!("Insufficient inventory. Only {} available.", available)),
                }
            }
        })
        .collect();

    let unavailable_products: Vec<ItemAvailability> = availability_results
        .iter()
        .filter(|r| !r.is_available)
        .cloned()
        .collect();

    AvailabilityReport {
        all_available: unavailable_products.is_empty(),
        availability_results,
        unavailable_products,
    }
}

/// Stock movement implied by an admin status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTransition {
    Release,
    Reserve,
    Unchanged,
}

pub fn stock_transition(from: OrderStatus, to: OrderStatus) -> StockTransition {
    if from == to {
        return StockTransition::Unchanged;
    }
    if from.holds_stock() && to.is_terminal_reversal() {
        return StockTransition::Release;
    }
    if from.is_terminal_reversal()
        && matches!(
            to,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    {
        return StockTransition::Reserve;
    }
    StockTransition::Unchanged
}

#[derive(Clone)]
pub struct Inventory {
    db: MongoDb,
}

impl Inventory {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    pub async fn check_availability(&self, items: &[StockRequest]) -> Result<AvailabilityReport, StoreError> {
        let ids: Vec<&str> = items.iter().map(|i| i.product.as_str()).collect();
        let products: Vec<Product> = self
            .db
            .products()
            .find(
                doc! { "product_id": { "$in": ids }, "status": "VISIBLE" },
                None,
            )
            .await?
            .try_collect()
            .await?;

        let stock: HashMap<String, (String, i64)> = products
            .into_iter()
            .filter(|p| p.status == ProductStatus::Visible)
            .map(|p| (p.product_id, (p.title, p.quantity)))
            .collect();

        let report = assess(items, &stock);
        record_inventory_operation(
            "check",
            if report.all_available { "available" } else { "unavailable" },
        );
        Ok(report)
    }

    /// Decrements every item in one transaction; nothing changes unless all succeed.
    pub async fn reserve(&self, items: &[StockRequest]) -> Result<(), StoreError> {
        let products = self.db.products();
        let mut session = self.db.client().start_session(None).await?;
        session.start_transaction(None).await?;

        for item in items {
            let updated = products
                .find_one_and_update_with_session(
                    doc! { "product_id": &item.product, "quantity": { "$gte": item.quantity } },
                    doc! {
                        "$inc": { "quantity": -item.quantity },
                        "$set": { "updatedAt": BsonDateTime::now() },
                    },
                    None,
                    &mut session,
                )
                .await;

            match updated {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let _ = session.abort_transaction().await;
                    record_inventory_operation("reserve", "insufficient");
                    tracing::warn!(product_id = %item.product, quantity = item.quantity, "Reservation rejected");
                    return Err(StoreError::InsufficientInventory(item.product.clone()));
                }
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    record_inventory_operation("reserve", "error");
                    return Err(e.into());
                }
            }
        }

        session.commit_transaction().await?;
        record_inventory_operation("reserve", "success");
        tracing::info!(items = items.len(), "Inventory reserved");
        Ok(())
    }

    /// Returns stock for every item in one transaction.
    pub async fn release(&self, items: &[StockRequest]) -> Result<(), StoreError> {
        let products = self.db.products();
        let mut session = self.db.client().start_session(None).await?;
        session.start_transaction(None).await?;

        for item in items {
            let result = products
                .update_one_with_session(
                    doc! { "product_id": &item.product },
                    doc! {
                        "$inc": { "quantity": item.quantity },
                        "$set": { "updatedAt": BsonDateTime::now() },
                    },
                    None,
                    &mut session,
                )
                .await;

            match result {
                Ok(r) if r.matched_count == 1 => {}
                Ok(_) => {
                    let _ = session.abort_transaction().await;
                    record_inventory_operation("release", "missing");
                    return Err(StoreError::ProductNotFound);
                }
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    record_inventory_operation("release", "error");
                    return Err(e.into());
                }
            }
        }

        session.commit_transaction().await?;
        record_inventory_operation("release", "success");
        tracing::info!(items = items.len(), "Inventory released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(product: &str, quantity: i64) -> StockRequest {
        StockRequest {
            product: product.to_string(),
            quantity,
        }
    }

    fn stock() -> HashMap<String, (String, i64)> {
        HashMap::from([
            ("EID2223".to_string(), ("Berbere".to_string(), 5)),
            ("EID2224".to_string(), ("Mitmita".to_string(), 1)),
        ])
    }

    #[test]
    fn all_items_in_stock() {
        let report = assess(&[req("EID2223", 5), req("EID2224", 1)], &stock());
        assert!(report.all_available);
        assert!(report.unavailable_products.is_empty());
    }

    #[test]
    fn shortfalls_and_unknown_products_are_reported() {
        let report = assess(&[req("EID2224", 2), req("EID9999", 1)], &stock());
        assert!(!report.all_available);
        assert_eq!(report.unavailable_products.len(), 2);
        assert_eq!(
            report.unavailable_products[0].error.as_deref(),
            Some("Insufficient inventory. Only 1 available.")
        );
        assert_eq!(report.unavailable_products[1].error.as_deref(), Some("Product not found"));
        assert_eq!(report.unavailable_products[1].available_quantity, 0);
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = assess(&[req("EID9999", 1)], &stock());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["allAvailable"], false);
        assert_eq!(json["unavailableProducts"][0]["productId"], "EID9999");
        assert_eq!(json["unavailableProducts"][0]["requestedQuantity"], 1);
    }

    #[test]
    fn cancelling_a_live_order_releases_stock() {
        use OrderStatus::*;
        for from in [Pending, Processing, Shipped] {
            for to in [Cancelled, Refunded] {
                assert_eq!(stock_transition(from, to), StockTransition::Release);
            }
        }
        assert_eq!(stock_transition(Delivered, Refunded), StockTransition::Unchanged);
    }

    #[test]
    fn reviving_a_cancelled_order_reserves_stock() {
        use OrderStatus::*;
        for to in [Processing, Shipped, Delivered] {
            assert_eq!(stock_transition(Cancelled, to), StockTransition::Reserve);
            assert_eq!(stock_transition(Refunded, to), StockTransition::Reserve);
        }
        assert_eq!(stock_transition(Cancelled, Pending), StockTransition::Unchanged);
        assert_eq!(stock_transition(Cancelled, Refunded), StockTransition::Unchanged);
    }

    #[test]
    fn same_status_is_a_no_op() {
        assert_eq!(
            stock_transition(OrderStatus::Shipped, OrderStatus::Shipped),
            StockTransition::Unchanged
        );
    }
}
