mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use store_service::models::{DiscountStatus, GlobalDiscount};
use store_service::services::discounts::reset_expired_discounts;
use image::{ImageBuffer, Rgba};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::io::Cursor;

fn png() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(8, 8, Rgba([180u8, 60, 20, 255]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

fn product_form(title: &str, image_name: &str) -> Form {
    Form::new()
        .text("title", title.to_string())
        .text("description", "Hand-blended berbere from sun-dried chilies. ".repeat(10))
        .text("ingredients", "Chili")
        .text("ingredients", "Garlic")
        .text("instructions", "Store in a cool dry place")
        .text("price", "12.5")
        .text("weight", "250")
        .text("weightUnit", "g")
        .text("quantity", "20")
        .part(
            "images",
            Part::bytes(png()).file_name(image_name.to_string()),
        )
}

async fn admin(app: &TestApp) -> String {
    let (id, token) = app.register_and_login("admin@mail.com", "0911111111").await;
    app.make_admin(&id).await;
    token
}

#[tokio::test]
async fn product_lifecycle() {
    let app = TestApp::spawn().await;
    let token = admin(&app).await;

    let created = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&token)
        .multipart(product_form("Berbere", "berbere.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let product: Value = created.json().await.unwrap();
    let product_id = product["id"].as_str().unwrap().to_string();
    assert!(product_id.starts_with("EID"));
    assert_eq!(product["ingredients"], json!(["Chili", "Garlic"]));

    let listed: Value = app
        .client
        .get(app.url("/products/all?search=berbere"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["response"].as_array().unwrap().len(), 1);

    let duplicate = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&token)
        .multipart(product_form("Berbere", "again.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    let removed = app
        .client
        .delete(app.url(&format!("/products/{}", product_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), 200);
    let body: Value = removed.json().await.unwrap();
    assert_eq!(body["message"], "Product removed successfully");

    let hidden = app
        .client
        .get(app.url(&format!("/products/{}", product_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn unsupported_image_type_is_rejected() {
    let app = TestApp::spawn().await;
    let token = admin(&app).await;

    let res = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&token)
        .multipart(product_form("Mitmita", "mitmita.svg"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Invalid file type. Only webp, jpeg, jpg, png, gif are allowed."
    );

    app.cleanup().await;
}

#[tokio::test]
async fn customers_cannot_create_products() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("buyer@mail.com", "0933333333").await;

    let res = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&token)
        .multipart(product_form("Korerima", "k.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    app.cleanup().await;
}

#[tokio::test]
async fn global_discount_applies_to_undiscounted_products() {
    let app = TestApp::spawn().await;
    let token = admin(&app).await;
    app.insert_product("EID3001", 5, 10.0).await;

    let end = (chrono::Utc::now() + chrono::Duration::days(2)).to_rfc3339();
    let res = app
        .client
        .put(app.url("/discounts"))
        .bearer_auth(&token)
        .json(&json!({ "discountPercentage": 15, "endDate": end }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert!(body["scheduledReset"]["jobName"]
        .as_str()
        .unwrap()
        .starts_with("reset-discount-"));

    let product = app.state.products.find("EID3001").await.unwrap().unwrap();
    assert_eq!(product.discount_percentage, 15.0);

    let second = app
        .client
        .put(app.url("/discounts"))
        .bearer_auth(&token)
        .json(&json!({ "discountPercentage": 5, "endDate": end }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 400);

    app.cleanup().await;
}

async fn create_global(app: &TestApp, token: &str, percentage: f64) -> Value {
    let end = (Utc::now() + Duration::days(2)).to_rfc3339();
    let res = app
        .client
        .put(app.url("/discounts"))
        .bearer_auth(token)
        .json(&json!({ "discountPercentage": percentage, "endDate": end }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    res.json().await.unwrap()
}

async fn global_status(app: &TestApp, discount: &GlobalDiscount) -> DiscountStatus {
    app.state
        .discounts
        .get_global(discount.id)
        .await
        .unwrap()
        .expect("discount exists")
        .status
}

#[tokio::test]
async fn deleting_a_global_discount_resets_its_products_and_job() {
    let app = TestApp::spawn().await;
    let token = admin(&app).await;
    app.insert_product("EID3101", 5, 10.0).await;

    let created = create_global(&app, &token, 15.0).await;
    let job = created["scheduledReset"]["jobName"].as_str().unwrap().to_string();
    assert!(app.state.discounts.scheduler().scheduled_jobs().contains(&job));

    app.insert_product("EID3102", 5, 10.0).await;
    app.state
        .discounts
        .apply_product_discount("EID3102", 30.0, Utc::now() + Duration::days(5))
        .await
        .unwrap();

    let res = app
        .client
        .delete(app.url(&format!("/discounts/{}", created["id"].as_str().unwrap())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Global discount deactivated successfully");
    assert_eq!(body["discount"]["status"], "REMOVED");
    assert_eq!(body["productsUpdated"], 1);

    let reset = app.state.products.find("EID3101").await.unwrap().unwrap();
    assert_eq!(reset.discount_percentage, 0.0);
    assert!(reset.discount_expiry.is_none());
    let own = app.state.products.find("EID3102").await.unwrap().unwrap();
    assert_eq!(own.discount_percentage, 30.0);
    assert!(!app.state.discounts.scheduler().scheduled_jobs().contains(&job));

    app.cleanup().await;
}

#[tokio::test]
async fn removed_product_discount_falls_back_to_running_global() {
    let app = TestApp::spawn().await;
    let token = admin(&app).await;
    app.insert_product("EID3103", 5, 10.0).await;
    let expiry = Utc::now() + Duration::days(5);

    app.state
        .discounts
        .apply_product_discount("EID3103", 25.0, expiry)
        .await
        .unwrap();
    let cleared = app
        .client
        .delete(app.url("/products/EID3103/discount"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), 200);
    let body: Value = cleared.json().await.unwrap();
    assert_eq!(body["discountPercentage"], 0.0);

    create_global(&app, &token, 10.0).await;
    let global = app.state.discounts.active_global().await.unwrap().unwrap();
    app.state
        .discounts
        .apply_product_discount("EID3103", 25.0, expiry)
        .await
        .unwrap();

    let res = app
        .client
        .delete(app.url("/products/EID3103/discount"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["discountPercentage"], 10.0);

    let product = app.state.products.find("EID3103").await.unwrap().unwrap();
    assert_eq!(product.discount_percentage, 10.0);
    assert_eq!(
        product.discount_expiry,
        Some(BsonDateTime::from_chrono(global.end_date))
    );

    app.cleanup().await;
}

#[tokio::test]
async fn expired_discounts_are_reset() {
    let app = TestApp::spawn().await;
    let past = Utc::now() - Duration::hours(1);
    app.insert_product("EID3104", 5, 10.0).await;
    app.insert_product("EID3105", 5, 10.0).await;

    app.db
        .products()
        .update_one(
            doc! { "product_id": "EID3104" },
            doc! { "$set": { "discountPercentage": 20.0, "discountExpiry": BsonDateTime::from_chrono(past) } },
            None,
        )
        .await
        .unwrap();
    app.state
        .discounts
        .apply_product_discount("EID3105", 20.0, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    let lapsed = GlobalDiscount::new(20.0, past - Duration::days(3), past);
    app.db.global_discounts().insert_one(&lapsed, None).await.unwrap();

    let reset = reset_expired_discounts(&app.db).await.unwrap();
    assert_eq!(reset, 1);

    let expired = app.state.products.find("EID3104").await.unwrap().unwrap();
    assert_eq!(expired.discount_percentage, 0.0);
    assert!(expired.discount_expiry.is_none());
    let running = app.state.products.find("EID3105").await.unwrap().unwrap();
    assert_eq!(running.discount_percentage, 20.0);
    assert_eq!(global_status(&app, &lapsed).await, DiscountStatus::Inactive);

    app.cleanup().await;
}

#[tokio::test]
async fn startup_reconciliation_retires_expired_and_schedules_running_discounts() {
    let app = TestApp::spawn().await;
    let past = Utc::now() - Duration::minutes(30);
    app.insert_product("EID3106", 5, 10.0).await;

    let expired = GlobalDiscount::new(12.0, past - Duration::days(2), past);
    let running = GlobalDiscount::new(8.0, Utc::now(), Utc::now() + Duration::days(3));
    app.db.global_discounts().insert_one(&expired, None).await.unwrap();
    app.db.global_discounts().insert_one(&running, None).await.unwrap();
    app.db
        .products()
        .update_one(
            doc! { "product_id": "EID3106" },
            doc! { "$set": { "discountPercentage": 12.0, "discountExpiry": BsonDateTime::from_chrono(past) } },
            None,
        )
        .await
        .unwrap();

    app.state.discounts.initialize_discount_jobs().await.unwrap();

    assert_eq!(global_status(&app, &expired).await, DiscountStatus::Inactive);
    assert_eq!(global_status(&app, &running).await, DiscountStatus::Active);
    let product = app.state.products.find("EID3106").await.unwrap().unwrap();
    assert_eq!(product.discount_percentage, 0.0);

    let jobs = app.state.discounts.scheduler().scheduled_jobs();
    assert!(jobs.contains(&running.job_name()));
    assert!(!jobs.contains(&expired.job_name()));

    app.cleanup().await;
}
