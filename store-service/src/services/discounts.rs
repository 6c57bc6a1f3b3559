//! Global and per-product discount rules, plus the expiry jobs that undo them.

use crate::models::{DiscountStatus, GlobalDiscount, Product};
use crate::services::database::MongoDb;
use crate::services::error::StoreError;
use crate::services::metrics::record_discount_job;
use crate::services::scheduler::{cron_expression, Scheduler};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::Serialize;

pub const ACTIVE_DISCOUNT_EXISTS: &str =
    "There is already an active global discount. Please deactivate it before adding a new one.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReset {
    pub job_name: String,
    pub cron_expression: String,
    pub reset_time: DateTime<Utc>,
}

impl ScheduledReset {
    pub fn for_discount(discount: &GlobalDiscount) -> Self {
        Self {
            job_name: discount.job_name(),
            cron_expression: cron_expression(discount.end_date),
            reset_time: discount.end_date,
        }
    }
}

#[derive(Debug, Default)]
pub struct GlobalDiscountUpdate {
    pub discount_percentage: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<DiscountStatus>,
}

/// What removing a product's own discount leaves behind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalOutcome {
    Clear,
    FallBackToGlobal { percentage: f64, expiry: DateTime<Utc> },
}

/// A product whose discount matches the running global one (or a 0% global) is cleared;
/// otherwise it inherits the global discount when one is running.
pub fn removal_outcome(product_percentage: f64, active_global: Option<&GlobalDiscount>) -> RemovalOutcome {
    match active_global {
        Some(global)
            if global.discount_percentage == product_percentage || global.discount_percentage == 0.0 =>
        {
            RemovalOutcome::Clear
        }
        Some(global) => RemovalOutcome::FallBackToGlobal {
            percentage: global.discount_percentage,
            expiry: global.end_date,
        },
        None => RemovalOutcome::Clear,
    }
}

fn cleared_discount() -> Document {
    doc! {
        "$set": {
            "discountPercentage": 0.0,
            "discountExpiry": null,
            "updatedAt": BsonDateTime::now(),
        }
    }
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[derive(Clone)]
pub struct DiscountEngine {
    db: MongoDb,
    scheduler: Scheduler,
}

impl DiscountEngine {
    pub fn new(db: MongoDb, scheduler: Scheduler) -> Self {
        Self { db, scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub async fn list_global(&self, skip: u64, limit: i64) -> Result<Vec<GlobalDiscount>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit)
            .build();
        Ok(self
            .db
            .global_discounts()
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?)
    }

    pub async fn get_global(&self, id: ObjectId) -> Result<Option<GlobalDiscount>, StoreError> {
        Ok(self.db.global_discounts().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn active_global(&self) -> Result<Option<GlobalDiscount>, StoreError> {
        Ok(self
            .db
            .global_discounts()
            .find_one(
                doc! { "status": "ACTIVE", "endDate": { "$gt": BsonDateTime::now() } },
                None,
            )
            .await?)
    }

    /// Inserts a store-wide discount, applies it to undiscounted products and schedules its expiry.
    pub async fn create_global(
        &self,
        percentage: f64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<(GlobalDiscount, ScheduledReset), StoreError> {
        if self.active_global().await?.is_some() {
            return Err(StoreError::Invalid(ACTIVE_DISCOUNT_EXISTS.to_string()));
        }

        let discount = GlobalDiscount::new(percentage, start_date, end_date);
        self.db.global_discounts().insert_one(&discount, None).await?;

        let applied = self
            .db
            .products()
            .update_many(
                doc! {
                    "$or": [
                        { "discountPercentage": 0 },
                        { "discountPercentage": { "$exists": false } },
                    ]
                },
                doc! {
                    "$set": {
                        "discountPercentage": percentage,
                        "discountExpiry": BsonDateTime::from_chrono(end_date),
                        "updatedAt": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await?;

        tracing::info!(
            discount_id = %discount.id,
            percentage,
            products = applied.modified_count,
            "Applied global discount"
        );

        self.schedule_reset(&discount);
        Ok((discount.clone(), ScheduledReset::for_discount(&discount)))
    }

    pub async fn update_global(
        &self,
        id: ObjectId,
        update: GlobalDiscountUpdate,
    ) -> Result<Option<GlobalDiscount>, StoreError> {
        let mut set = doc! { "updatedAt": BsonDateTime::now() };
        if let Some(pct) = update.discount_percentage {
            set.insert("discountPercentage", pct);
        }
        if let Some(start) = update.start_date {
            set.insert("startDate", BsonDateTime::from_chrono(start));
        }
        if let Some(end) = update.end_date {
            set.insert("endDate", BsonDateTime::from_chrono(end));
        }
        if let Some(status) = update.status {
            set.insert("status", mongodb::bson::to_bson(&status).map_err(anyhow::Error::from)?);
        }

        let updated = self
            .db
            .global_discounts()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?;

        if let (Some(discount), Some(_)) = (&updated, update.end_date) {
            if discount.status == DiscountStatus::Active {
                self.schedule_reset(discount);
            } else {
                self.scheduler.stop_job(&discount.job_name());
            }
        }

        Ok(updated)
    }

    /// Marks the discount REMOVED, strips it from the products carrying it and cancels its job.
    pub async fn deactivate_global(&self, id: ObjectId) -> Result<Option<(GlobalDiscount, u64)>, StoreError> {
        let Some(discount) = self
            .db
            .global_discounts()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "status": "REMOVED", "updatedAt": BsonDateTime::now() } },
                return_updated(),
            )
            .await?
        else {
            return Ok(None);
        };

        let reset = self.reset_products_for(&discount).await?;
        self.scheduler.stop_job(&discount.job_name());

        tracing::info!(discount_id = %discount.id, products = reset, "Global discount deactivated");
        Ok(Some((discount, reset)))
    }

    async fn reset_products_for(&self, discount: &GlobalDiscount) -> Result<u64, StoreError> {
        let result = self
            .db
            .products()
            .update_many(
                doc! {
                    "discountPercentage": discount.discount_percentage,
                    "discountExpiry": BsonDateTime::from_chrono(discount.end_date),
                },
                cleared_discount(),
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    pub async fn apply_product_discount(
        &self,
        product_id: &str,
        percentage: f64,
        expiry: DateTime<Utc>,
    ) -> Result<Option<Product>, StoreError> {
        let product = self
            .db
            .products()
            .find_one_and_update(
                doc! { "product_id": product_id },
                doc! {
                    "$set": {
                        "discountPercentage": percentage,
                        "discountExpiry": BsonDateTime::from_chrono(expiry),
                        "updatedAt": BsonDateTime::now(),
                    }
                },
                return_updated(),
            )
            .await?;

        if product.is_some() {
            tracing::info!(product_id = %product_id, percentage, "Applied product discount");
        }
        Ok(product)
    }

    pub async fn remove_product_discount(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let Some(current) = self
            .db
            .products()
            .find_one(doc! { "product_id": product_id }, None)
            .await?
        else {
            return Ok(None);
        };

        let active = self.active_global().await?;
        let update = match removal_outcome(current.discount_percentage, active.as_ref()) {
            RemovalOutcome::Clear => {
                tracing::info!(product_id = %product_id, "Removing product discount");
                cleared_discount()
            }
            RemovalOutcome::FallBackToGlobal { percentage, expiry } => {
                tracing::info!(product_id = %product_id, percentage, "Product falls back to global discount");
                doc! {
                    "$set": {
                        "discountPercentage": percentage,
                        "discountExpiry": BsonDateTime::from_chrono(expiry),
                        "updatedAt": BsonDateTime::now(),
                    }
                }
            }
        };

        Ok(self
            .db
            .products()
            .find_one_and_update(doc! { "product_id": product_id }, update, return_updated())
            .await?)
    }

    fn schedule_reset(&self, discount: &GlobalDiscount) {
        let db = self.db.clone();
        self.scheduler.schedule_job(&discount.job_name(), discount.end_date, async move {
            match reset_expired_discounts(&db).await {
                Ok(_) => record_discount_job("success"),
                Err(e) => {
                    record_discount_job("error");
                    tracing::error!(error = %e, "Discount reset job failed");
                }
            }
        });
    }

    /// Reconciles ACTIVE discounts at startup: expired ones are undone, the rest get reset jobs.
    pub async fn initialize_discount_jobs(&self) -> Result<(), StoreError> {
        let active: Vec<GlobalDiscount> = self
            .db
            .global_discounts()
            .find(doc! { "status": "ACTIVE" }, None)
            .await?
            .try_collect()
            .await?;

        tracing::info!(count = active.len(), "Initializing discount jobs");
        let now = Utc::now();

        for discount in active {
            if discount.end_date <= now {
                let reset = self.reset_products_for(&discount).await?;
                self.db
                    .global_discounts()
                    .update_one(
                        doc! { "_id": discount.id },
                        doc! { "$set": { "status": "INACTIVE", "updatedAt": BsonDateTime::now() } },
                        None,
                    )
                    .await?;
                tracing::info!(discount_id = %discount.id, products = reset, "Expired discount reset");
            } else {
                self.schedule_reset(&discount);
            }
        }

        Ok(())
    }
}

/// Clears lapsed product discounts and retires global discounts past their end date.
pub async fn reset_expired_discounts(db: &MongoDb) -> Result<u64, StoreError> {
    let now = BsonDateTime::now();

    let products = db
        .products()
        .update_many(doc! { "discountExpiry": { "$lte": now } }, cleared_discount(), None)
        .await?;

    let retired = db
        .global_discounts()
        .update_many(
            doc! { "status": "ACTIVE", "endDate": { "$lte": now } },
            doc! { "$set": { "status": "INACTIVE", "updatedAt": now } },
            None,
        )
        .await?;

    tracing::info!(
        products = products.modified_count,
        discounts = retired.modified_count,
        "Reset expired discounts"
    );
    Ok(products.modified_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn global(pct: f64) -> GlobalDiscount {
        GlobalDiscount::new(pct, Utc::now(), Utc::now() + Duration::days(7))
    }

    #[test]
    fn matching_global_percentage_clears_the_product() {
        assert_eq!(removal_outcome(20.0, Some(&global(20.0))), RemovalOutcome::Clear);
    }

    #[test]
    fn zero_percent_global_clears_the_product() {
        assert_eq!(removal_outcome(35.0, Some(&global(0.0))), RemovalOutcome::Clear);
    }

    #[test]
    fn different_global_percentage_is_inherited() {
        let g = global(10.0);
        assert_eq!(
            removal_outcome(35.0, Some(&g)),
            RemovalOutcome::FallBackToGlobal {
                percentage: 10.0,
                expiry: g.end_date
            }
        );
    }

    #[test]
    fn no_global_discount_clears_the_product() {
        assert_eq!(removal_outcome(35.0, None), RemovalOutcome::Clear);
    }

    #[test]
    fn scheduled_reset_describes_the_job() {
        let g = global(15.0);
        let reset = ScheduledReset::for_discount(&g);
        assert_eq!(reset.job_name, format!("reset-discount-{}", g.id.to_hex()));
        assert_eq!(reset.cron_expression, cron_expression(g.end_date));

        let json = serde_json::to_value(&reset).unwrap();
        assert!(json.get("jobName").is_some());
        assert!(json.get("resetTime").is_some());
    }
}
