use secrecy::Secret;
use store_service::config::StripeConfig;
use store_service::services::error::StoreError;
use store_service::services::stripe::{CheckoutLineItem, CheckoutSessionRequest};
use store_service::services::StripeClient;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new(StripeConfig {
        secret_key: Secret::new("sk_test_123".to_string()),
        webhook_secret: Secret::new(String::new()),
        api_base_url: format!("{}/v1", server.uri()),
    })
}

#[tokio::test]
async fn payment_intent_is_created_in_cents_with_order_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_string_contains("amount=2650"))
        .and(body_string_contains("currency=usd"))
        .and(body_string_contains("metadata%5BorderId%5D=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_1",
            "client_secret": "pi_1_secret",
            "amount": 2650
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = client(&server)
        .create_payment_intent(2650, &[("orderId", "abc123")])
        .await
        .unwrap();

    assert_eq!(intent.id, "pi_1");
    assert_eq!(intent.client_secret.as_deref(), Some("pi_1_secret"));
}

#[tokio::test]
async fn checkout_session_posts_line_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=499"))
        .and(body_string_contains("metadata%5BorderType%5D=guest_checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_1",
            "url": "https://checkout.stripe.test/cs_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server)
        .create_checkout_session(&CheckoutSessionRequest {
            order_id: "abc123".to_string(),
            customer_email: Some("guest@mail.com".to_string()),
            success_url: "http://shop/success".to_string(),
            cancel_url: "http://shop/cancel".to_string(),
            line_items: vec![CheckoutLineItem {
                product_id: "EID2223".to_string(),
                name: "Mitmita".to_string(),
                description: None,
                unit_amount: 499,
                quantity: 2,
                images: vec![],
            }],
            metadata: vec![("orderType".to_string(), "guest_checkout".to_string())],
        })
        .await
        .unwrap();

    assert_eq!(session.id, "cs_1");
    assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.test/cs_1"));
}

#[tokio::test]
async fn provider_errors_surface_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": { "message": "Your card was declined.", "type": "card_error" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_customer("a@mail.com", "A B", None)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Payment(ref msg) if msg == "Your card was declined."));
}

#[tokio::test]
async fn missing_api_key_is_reported_without_calling_out() {
    let server = MockServer::start().await;
    let client = StripeClient::new(StripeConfig {
        secret_key: Secret::new(String::new()),
        webhook_secret: Secret::new(String::new()),
        api_base_url: server.uri(),
    });

    let err = client.create_payment_intent(100, &[]).await.unwrap_err();
    assert!(matches!(err, StoreError::PaymentNotConfigured));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
