//! Storefront public API against a running storefront.
//!
//! Run with: cargo test -p emporium-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use emporium_integration_tests::{client, envelope, storefront_api, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_health() {
    let client = client().expect("client");
    let resp = client
        .get(format!("{}/health/ready", storefront_base_url()))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_product_listing_envelope() {
    let client = client().expect("client");
    let body: Value = client
        .get(storefront_api("products"))
        .query(&[("per_page", "5")])
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    let (success, data, _) = envelope(&body);
    assert!(success);
    assert!(data["items"].as_array().is_some_and(|items| items.len() <= 5));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unknown_order_is_404() {
    let client = client().expect("client");
    let resp = client
        .get(storefront_api("orders/EM-00000000-NONE"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_order_with_unknown_product_is_rejected() {
    let client = client().expect("client");
    let resp = client
        .post(storefront_api("orders"))
        .json(&json!({
            "email": "e2e@example.org",
            "items": [{ "product_id": 999_999_999, "quantity": 1 }],
            "shipping_address": {
                "customer_name": "E2E Shopper",
                "address_line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            },
            "shipping_method_id": 1
        }))
        .send()
        .await
        .expect("request");
    assert!(resp.status().is_client_error(), "got {}", resp.status());
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unknown_coupon_is_reported_invalid() {
    let client = client().expect("client");
    let body: Value = client
        .post(storefront_api("coupons/validate"))
        .json(&json!({ "code": "NO-SUCH-CODE", "subtotal": "50.00" }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["valid"], false);
}
