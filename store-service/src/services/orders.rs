use crate::models::{CustomerInfo, Order, OrderStatus, PaymentStatus, ShippingAddress};
use crate::services::database::MongoDb;
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

#[derive(Clone)]
pub struct OrderRepository {
    db: MongoDb,
}

/// Provider ids and card details recorded against an order.
#[derive(Debug, Default)]
pub struct PaymentInfoUpdate {
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_checkout_session_id: Option<String>,
    pub last_four_digits: Option<String>,
}

impl PaymentInfoUpdate {
    fn to_set(&self) -> Document {
        let mut set = Document::new();
        let fields = [
            ("paymentInfo.stripePaymentIntentId", &self.stripe_payment_intent_id),
            ("paymentInfo.stripeCustomerId", &self.stripe_customer_id),
            ("paymentInfo.stripeCheckoutSessionId", &self.stripe_checkout_session_id),
            ("paymentInfo.lastFourDigits", &self.last_four_digits),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                set.insert(key, value.clone());
            }
        }
        set
    }
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

impl OrderRepository {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    pub async fn create(&self, order: &Order) -> Result<()> {
        self.db.orders().insert_one(order, None).await?;
        tracing::info!(order_id = %order.id, total = order.total, "Order created");
        Ok(())
    }

    pub async fn delete(&self, id: ObjectId) -> Result<()> {
        self.db.orders().delete_one(doc! { "_id": id }, None).await?;
        Ok(())
    }

    pub async fn find(&self, id: ObjectId) -> Result<Option<Order>> {
        Ok(self.db.orders().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>> {
        Ok(self
            .db
            .orders()
            .find_one(doc! { "paymentInfo.stripePaymentIntentId": payment_intent_id }, None)
            .await?)
    }

    /// Newest first.
    pub async fn list(&self, filter: Document, skip: u64, limit: u64) -> Result<Vec<Order>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        Ok(self.db.orders().find(filter, options).await?.try_collect().await?)
    }

    pub async fn list_for_user(&self, user: ObjectId, skip: u64, limit: u64) -> Result<Vec<Order>> {
        self.list(doc! { "user": user }, skip, limit).await
    }

    pub async fn set_order_status(&self, id: ObjectId, status: OrderStatus) -> Result<Option<Order>> {
        self.set(id, doc! { "orderStatus": status.as_str() }).await
    }

    pub async fn set_payment_status(&self, id: ObjectId, status: PaymentStatus) -> Result<Option<Order>> {
        self.set(id, doc! { "paymentStatus": to_bson(&status)? }).await
    }

    /// Payment confirmed: PAID and PROCESSING in one write.
    pub async fn mark_paid(&self, id: ObjectId) -> Result<Option<Order>> {
        self.set(
            id,
            doc! {
                "paymentStatus": to_bson(&PaymentStatus::Paid)?,
                "orderStatus": OrderStatus::Processing.as_str(),
            },
        )
        .await
    }

    pub async fn update_payment_info(&self, id: ObjectId, update: &PaymentInfoUpdate) -> Result<Option<Order>> {
        let set = update.to_set();
        if set.is_empty() {
            return self.find(id).await;
        }
        self.set(id, set).await
    }

    pub async fn update_contact(
        &self,
        id: ObjectId,
        customer: &CustomerInfo,
        shipping: &ShippingAddress,
    ) -> Result<Option<Order>> {
        self.set(
            id,
            doc! {
                "customerInfo": to_bson(customer)?,
                "shippingAddress": to_bson(shipping)?,
            },
        )
        .await
    }

    async fn set(&self, id: ObjectId, mut set: Document) -> Result<Option<Order>> {
        set.insert("updatedAt", BsonDateTime::now());
        Ok(self
            .db
            .orders()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?)
    }
}
