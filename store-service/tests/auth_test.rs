mod common;

use common::{TestApp, STRONG_PASSWORD};
use mongodb::bson::doc;
use serde_json::{json, Value};

#[tokio::test]
async fn register_then_login_returns_token_and_profile() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.url("/register"))
        .json(&TestApp::register_body("abebe@mail.com", "0912345678"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["email"], "abebe@mail.com");
    assert!(user.get("password").is_none());

    let login: Value = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "email": "abebe@mail.com", "password": STRONG_PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(login["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(login["id"], user["id"]);

    app.cleanup().await;
}

#[tokio::test]
async fn duplicate_email_and_phone_conflict() {
    let app = TestApp::spawn().await;
    app.register_and_login("dup@mail.com", "0912345678").await;

    let same_email = app
        .client
        .post(app.url("/register"))
        .json(&TestApp::register_body("dup@mail.com", "0987654321"))
        .send()
        .await
        .unwrap();
    assert_eq!(same_email.status(), 409);
    let body: Value = same_email.json().await.unwrap();
    assert_eq!(body["message"], "Email Already Exists");

    let same_phone = app
        .client
        .post(app.url("/register"))
        .json(&TestApp::register_body("other@mail.com", "0912345678"))
        .send()
        .await
        .unwrap();
    assert_eq!(same_phone.status(), 409);
    let body: Value = same_phone.json().await.unwrap();
    assert_eq!(body["message"], "Phone Number Already Exists");

    app.cleanup().await;
}

#[tokio::test]
async fn weak_password_is_rejected_with_field() {
    let app = TestApp::spawn().await;

    let mut body = TestApp::register_body("weak@mail.com", "0912345678");
    body["password"] = json!("password");

    let res = app.client.post(app.url("/register")).json(&body).send().await.unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "password");

    app.cleanup().await;
}

#[tokio::test]
async fn wrong_password_does_not_log_in() {
    let app = TestApp::spawn().await;
    app.register_and_login("login@mail.com", "0912345678").await;

    let res = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "email": "login@mail.com", "password": "Wrong#Pass1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "The Credentials Dont Match Any User");

    app.cleanup().await;
}

#[tokio::test]
async fn verification_code_resets_password_once() {
    let app = TestApp::spawn().await;
    app.register_and_login("reset@mail.com", "0912345678").await;

    let sent = app
        .client
        .post(app.url("/send_verification"))
        .json(&json!({ "email": "reset@mail.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status(), 200);

    let code = app
        .db
        .verifications()
        .find_one(doc! { "email": "reset@mail.com" }, None)
        .await
        .unwrap()
        .expect("verification stored")
        .code;
    assert_eq!(code.len(), 6);

    let reset = json!({ "email": "reset@mail.com", "code": code, "newPassword": "Shiro@2025x" });
    let res = app
        .client
        .patch(app.url("/verify_code"))
        .json(&reset)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Password reset Successfully");

    let reused = app
        .client
        .patch(app.url("/verify_code"))
        .json(&reset)
        .send()
        .await
        .unwrap();
    assert_eq!(reused.status(), 400);

    let login = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "email": "reset@mail.com", "password": "Shiro@2025x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_email_still_reports_code_sent() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.url("/send_verification"))
        .json(&json!({ "email": "ghost@mail.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Code Sent Successfully");

    app.cleanup().await;
}

#[tokio::test]
async fn customers_cannot_reach_admin_routes() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("plain@mail.com", "0912345678").await;

    let res = app
        .client
        .get(app.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    app.cleanup().await;
}

#[tokio::test]
async fn updating_to_another_users_contact_details_conflicts() {
    let app = TestApp::spawn().await;
    let (admin_id, token) = app.register_and_login("admin@mail.com", "0911111111").await;
    app.make_admin(&admin_id).await;
    let (customer_id, _) = app.register_and_login("buyer@mail.com", "0922222222").await;

    let email = app
        .client
        .put(app.url(&format!("/users/{}", customer_id)))
        .bearer_auth(&token)
        .json(&json!({ "email": "admin@mail.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(email.status(), 409);
    let body: Value = email.json().await.unwrap();
    assert_eq!(body["message"], "Email Already Exists");

    let phone = app
        .client
        .put(app.url(&format!("/users/{}", customer_id)))
        .bearer_auth(&token)
        .json(&json!({ "phone_number": "0911111111" }))
        .send()
        .await
        .unwrap();
    assert_eq!(phone.status(), 409);
    let body: Value = phone.json().await.unwrap();
    assert_eq!(body["message"], "Phone Number Already Exists");

    let own = app
        .client
        .put(app.url(&format!("/users/{}", customer_id)))
        .bearer_auth(&token)
        .json(&json!({ "email": "buyer@mail.com", "firstName": "Sara" }))
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), 200);

    app.cleanup().await;
}
