use crate::models::counter::{PRODUCT_COUNTER, PRODUCT_COUNTER_START};
use crate::models::Product;
use crate::services::database::MongoDb;
use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions};

pub const TOP_DEALS_LIMIT: i64 = 3;

#[derive(Clone)]
pub struct ProductRepository {
    db: MongoDb,
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

pub fn public_product_id(sequence: i64) -> String {
    format!("EID{}", sequence)
}

impl ProductRepository {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    /// Atomically mints the next `EID{n}` id.
    pub async fn next_product_id(&self) -> Result<String> {
        let counters = self.db.counters();

        counters
            .update_one(
                doc! { "for": PRODUCT_COUNTER },
                doc! { "$setOnInsert": { "counter": PRODUCT_COUNTER_START } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;

        let counter = counters
            .find_one_and_update(
                doc! { "for": PRODUCT_COUNTER },
                doc! { "$inc": { "counter": 1_i64 } },
                return_updated(),
            )
            .await?
            .ok_or_else(|| anyhow!("Product counter missing"))?;

        Ok(public_product_id(counter.counter))
    }

    pub async fn create(&self, product: &Product) -> Result<()> {
        self.db.products().insert_one(product, None).await?;
        tracing::info!(product_id = %product.product_id, "Product created");
        Ok(())
    }

    pub async fn find_visible(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self
            .db
            .products()
            .find_one(doc! { "product_id": product_id, "status": "VISIBLE" }, None)
            .await?)
    }

    pub async fn find(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self
            .db
            .products()
            .find_one(doc! { "product_id": product_id }, None)
            .await?)
    }

    pub async fn find_by_title(&self, title: &str) -> Result<Option<Product>> {
        Ok(self.db.products().find_one(doc! { "title": title }, None).await?)
    }

    pub async fn list(&self, filter: Document, skip: u64, limit: u64) -> Result<Vec<Product>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        Ok(self.db.products().find(filter, options).await?.try_collect().await?)
    }

    /// Visible products with a running discount, deepest first.
    pub async fn top_deals(&self) -> Result<Vec<Product>> {
        let options = FindOptions::builder()
            .sort(doc! { "discountPercentage": -1 })
            .limit(TOP_DEALS_LIMIT)
            .build();
        Ok(self
            .db
            .products()
            .find(
                doc! {
                    "status": "VISIBLE",
                    "discountPercentage": { "$gt": 0 },
                    "discountExpiry": { "$gt": BsonDateTime::now() },
                },
                options,
            )
            .await?
            .try_collect()
            .await?)
    }

    pub async fn update(&self, product_id: &str, mut set: Document) -> Result<Option<Product>> {
        set.insert("updatedAt", BsonDateTime::now());
        Ok(self
            .db
            .products()
            .find_one_and_update(doc! { "product_id": product_id }, doc! { "$set": set }, return_updated())
            .await?)
    }

    pub async fn hide(&self, product_id: &str) -> Result<Option<Product>> {
        self.update(product_id, doc! { "status": "HIDDEN" }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_ids_are_prefixed() {
        assert_eq!(public_product_id(PRODUCT_COUNTER_START + 1), "EID2223");
    }
}
