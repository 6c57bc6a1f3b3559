use crate::models::{
    AboutUs, ContactInfo, Content, Counter, GlobalDiscount, ImageAsset, Order, Permission,
    Product, Role, User, Verification,
};
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

fn index(keys: Document, name: &str, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build()
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "MongoDB client ready");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for store-service");

        self.users()
            .create_indexes(
                [
                    index(doc! { "email": 1 }, "user_email_unique", true),
                    index(doc! { "phone_number": 1 }, "user_phone_unique", true),
                ],
                None,
            )
            .await?;

        self.roles()
            .create_index(index(doc! { "name": 1 }, "role_name_unique", true), None)
            .await?;

        self.permissions()
            .create_indexes(
                [
                    index(doc! { "code": 1 }, "permission_code_unique", true),
                    index(doc! { "category": 1, "status": 1 }, "permission_category", false),
                ],
                None,
            )
            .await?;

        self.products()
            .create_indexes(
                [
                    index(doc! { "product_id": 1 }, "product_public_id_unique", true),
                    index(doc! { "title": 1 }, "product_title_unique", true),
                    index(doc! { "status": 1, "discountPercentage": -1 }, "product_deals", false),
                ],
                None,
            )
            .await?;

        self.orders()
            .create_indexes(
                [
                    index(doc! { "user": 1, "createdAt": -1 }, "order_user_recent", false),
                    index(
                        doc! { "paymentInfo.stripePaymentIntentId": 1 },
                        "order_payment_intent",
                        false,
                    ),
                ],
                None,
            )
            .await?;

        self.global_discounts()
            .create_index(index(doc! { "endDate": 1 }, "discount_end_date", false), None)
            .await?;

        self.contents()
            .create_index(index(doc! { "name": 1 }, "content_name_unique", true), None)
            .await?;

        self.images()
            .create_index(index(doc! { "name": 1 }, "image_name_unique", true), None)
            .await?;

        self.about()
            .create_index(index(doc! { "name": 1 }, "about_name_unique", true), None)
            .await?;

        self.verifications()
            .create_index(index(doc! { "email": 1 }, "verification_email_unique", true), None)
            .await?;

        self.counters()
            .create_index(index(doc! { "for": 1 }, "counter_for_unique", true), None)
            .await?;

        tracing::info!("store-service indexes initialized");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn roles(&self) -> Collection<Role> {
        self.db.collection("roles")
    }

    pub fn permissions(&self) -> Collection<Permission> {
        self.db.collection("permissions")
    }

    pub fn products(&self) -> Collection<Product> {
        self.db.collection("products")
    }

    pub fn orders(&self) -> Collection<Order> {
        self.db.collection("orders")
    }

    pub fn global_discounts(&self) -> Collection<GlobalDiscount> {
        self.db.collection("globaldiscounts")
    }

    pub fn contents(&self) -> Collection<Content> {
        self.db.collection("contents")
    }

    pub fn images(&self) -> Collection<ImageAsset> {
        self.db.collection("images")
    }

    pub fn about(&self) -> Collection<AboutUs> {
        self.db.collection("abouts")
    }

    pub fn contact_info(&self) -> Collection<ContactInfo> {
        self.db.collection("contact-infos")
    }

    pub fn verifications(&self) -> Collection<Verification> {
        self.db.collection("verifications")
    }

    pub fn counters(&self) -> Collection<Counter> {
        self.db.collection("counters")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
