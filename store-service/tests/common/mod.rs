#![allow(dead_code)]

use secrecy::Secret;
use service_core::config::{Config as CoreConfig, Environment};
use std::sync::Arc;
use store_service::config::{
    CheckoutConfig, GeocoderConfig, JwtConfig, MongoConfig, RateLimitConfig, SmtpConfig,
    StoreConfig, StripeConfig, UploadsConfig,
};
use mongodb::bson::oid::ObjectId;
use store_service::middleware::ADMIN_ROLE;
use store_service::models::{Product, ProductStatus, WeightUnit};
use store_service::services::seed::migrate_roles_and_permissions;
use store_service::services::{MockEmailService, MongoDb};
use store_service::startup::{AppState, Application};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const STRONG_PASSWORD: &str = "Berbere#2024";

/// Configuration that never reaches a real provider. Stripe and OpenCage point at
/// unroutable defaults unless a test swaps in a mock server URL.
pub fn test_config() -> StoreConfig {
    let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    StoreConfig {
        common: CoreConfig { port: 0 },
        environment: Environment::Dev,
        mongodb: MongoConfig {
            uri,
            database: format!("store_test_{}", Uuid::new_v4().simple()),
        },
        jwt: JwtConfig {
            secret: Secret::new("test-secret".to_string()),
            expiry_hours: 1,
        },
        stripe: StripeConfig {
            secret_key: Secret::new("sk_test_123".to_string()),
            webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
            api_base_url: "http://127.0.0.1:9/v1".to_string(),
        },
        checkout: CheckoutConfig {
            success_url: "http://localhost:7777/cart/success".to_string(),
            cancel_url: "http://localhost:7777/cart/cancel".to_string(),
        },
        uploads: UploadsConfig {
            dir: format!("target/test-uploads-{}", Uuid::new_v4()),
        },
        geocoder: GeocoderConfig {
            api_key: Secret::new("geo-key".to_string()),
            base_url: "http://127.0.0.1:9/geocode".to_string(),
        },
        smtp: SmtpConfig {
            host: String::new(),
            user: String::new(),
            password: Secret::new(String::new()),
            from: "shop@localhost".to_string(),
        },
        rate_limit: RateLimitConfig {
            auth_attempts: 100,
            auth_window_seconds: 60,
        },
    }
}

/// State for router-level tests. The Mongo client is created lazily, so routes that
/// reject before touching the database need no server.
pub async fn test_state(config: StoreConfig) -> (AppState, MockEmailService) {
    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .expect("Failed to create MongoDB client");
    let email = MockEmailService::default();
    let state = AppState::new(config, db, Arc::new(email.clone()));
    (state, email)
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: MongoDb,
    pub state: AppState,
    pub client: reqwest::Client,
    uploads_dir: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: StoreConfig) -> Self {
        let uploads_dir = config.uploads.dir.clone();

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db().clone();
        let state = app.state().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            state,
            client,
            uploads_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub fn register_body(email: &str, phone: &str) -> serde_json::Value {
        serde_json::json!({
            "firstName": "Abebe",
            "fathersName": "Kebede",
            "email": email,
            "phone_number": phone,
            "password": STRONG_PASSWORD,
        })
    }

    /// Registers a customer and returns `(user_id, token)`.
    pub async fn register_and_login(&self, email: &str, phone: &str) -> (String, String) {
        let res = self
            .client
            .post(self.url("/register"))
            .json(&Self::register_body(email, phone))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(res.status(), 201, "register failed: {:?}", res.text().await);

        let login: serde_json::Value = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({ "email": email, "password": STRONG_PASSWORD }))
            .send()
            .await
            .expect("login request failed")
            .json()
            .await
            .expect("login body");

        (
            login["id"].as_str().unwrap_or_default().to_string(),
            login["token"].as_str().unwrap_or_default().to_string(),
        )
    }

    /// Seeds the permission catalogue and gives the user the ADMIN role.
    pub async fn make_admin(&self, user_id: &str) {
        migrate_roles_and_permissions(&self.state.access)
            .await
            .expect("Failed to seed roles");
        let role = self
            .state
            .access
            .find_role_by_name(ADMIN_ROLE)
            .await
            .unwrap()
            .expect("ADMIN role seeded");
        let user_id = ObjectId::parse_str(user_id).unwrap();
        self.state.users.add_roles(user_id, &[role.id]).await.unwrap();
    }

    pub async fn insert_product(&self, product_id: &str, quantity: i64, price: f64) -> Product {
        let now = chrono::Utc::now();
        let product = Product {
            id: ObjectId::new(),
            product_id: product_id.to_string(),
            title: format!("Spice {}", product_id),
            images: vec!["spice.webp".to_string()],
            description: "Stone ground".repeat(40),
            ingredients: vec!["Chili".to_string()],
            instructions: vec!["Keep dry".to_string()],
            price,
            discount_percentage: 0.0,
            discount_expiry: None,
            weight: 250.0,
            weight_unit: WeightUnit::G,
            quantity,
            status: ProductStatus::Visible,
            created_at: now,
            updated_at: now,
        };
        self.state.products.create(&product).await.unwrap();
        product
    }

    pub async fn cleanup(&self) {
        self.db.database().drop(None).await.ok();
        tokio::fs::remove_dir_all(&self.uploads_dir).await.ok();
    }
}
