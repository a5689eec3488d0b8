use actix_web::{
    http::{header::RETRY_AFTER, StatusCode},
    test::TestRequest,
};
use cpg_engine::{db_types::TransactionId, InitiationFields, TransactionApi};
use serde_json::json;

use super::helpers::{authenticator, bearer, valid_token, TestShop, MERCHANT_KEY};
use crate::config::GatewayKeys;

fn initiation(body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri("/payment/gateway/create").set_json(body)
}

fn asha(amount: serde_json::Value) -> serde_json::Value {
    json!({ "amount": amount, "name": "Asha", "email": "asha@example.com", "phone": "9876543210" })
}

#[actix_web::test]
async fn anonymous_initiation_is_signed_and_recorded() {
    let shop = TestShop::new().await;
    let res = shop.send(initiation(asha(json!(1600)))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    assert_eq!(body["key"], MERCHANT_KEY);
    assert_eq!(body["amount"], "1600");
    assert_eq!(body["productinfo"], "Order");
    assert_eq!(body["firstname"], "Asha");
    assert_eq!(body["phone"], "9876543210");
    assert_eq!(body["surl"], "https://api.shop.example/api/payment/gateway/callback?status=success");
    assert_eq!(body["furl"], "https://api.shop.example/api/payment/gateway/callback?status=fail");
    assert_eq!(body["frontendSuccessUrl"], "https://shop.example/payment-success");
    assert_eq!(body["frontendFailUrl"], "https://shop.example/payment-fail");

    let txnid = body["txnid"].as_str().unwrap().to_string();
    let expected = authenticator().sign(
        &InitiationFields {
            txn_id: &txnid,
            amount: "1600",
            product_info: "Order",
            payer_name: "Asha",
            payer_email: "asha@example.com",
        }
        .into(),
    );
    assert_eq!(body["hash"], expected);

    let pending = TransactionApi::new(shop.db.clone())
        .pending_transaction(&TransactionId::from(txnid))
        .await
        .unwrap()
        .expect("pending transaction was recorded");
    assert_eq!(pending.amount, "1600");
    assert_eq!(pending.user_id, None);
    shop.tear_down().await;
}

#[actix_web::test]
async fn signed_in_initiations_remember_the_initiator() {
    let shop = TestShop::new().await;
    let customer = shop.shopper_with_kurtas("Ravi", "ravi@example.com").await;
    let req = initiation(json!({ "amount": "1600.00", "name": "Ravi", "email": "ravi@example.com", "phone": "9123456780" }))
        .insert_header(bearer(&valid_token(customer.id)));
    let res = shop.send(req).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let txnid = res.json()["txnid"].as_str().unwrap().to_string();
    let pending = TransactionApi::new(shop.db.clone()).pending_transaction(&txnid.into()).await.unwrap().unwrap();
    assert_eq!(pending.user_id, Some(customer.id));
    assert_eq!(pending.amount, "1600.00");
    shop.tear_down().await;
}

#[actix_web::test]
async fn repeated_initiations_are_throttled() {
    let shop = TestShop::new().await;
    let first = shop.send(initiation(asha(json!(499)))).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = shop.send(initiation(asha(json!(499)))).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers.get(RETRY_AFTER).unwrap(), "60");
    assert_eq!(second.json()["retryAfter"], 60);
    assert_eq!(second.error(), "Too many requests. Please wait a moment before trying again.");

    // a different amount is a different request
    let third = shop.send(initiation(asha(json!(500)))).await;
    assert_eq!(third.status, StatusCode::OK);
    shop.tear_down().await;
}

#[actix_web::test]
async fn invalid_requests_do_not_count_as_attempts() {
    let shop = TestShop::new().await;
    let mut body = asha(json!(250));
    body["phone"] = json!("98765");
    let res = shop.send(initiation(body)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Phone number must be 10 digits");
    assert!(shop.dedup.is_empty());

    let res = shop.send(initiation(asha(json!(250)))).await;
    assert_eq!(res.status, StatusCode::OK);
    shop.tear_down().await;
}

#[actix_web::test]
async fn validation_messages() {
    let shop = TestShop::new().await;
    let res = shop.send(initiation(json!({ "email": "asha@example.com" }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Missing required fields: amount, name, phone");

    let res = shop.send(initiation(asha(json!("12.345")))).await;
    assert_eq!(res.error(), "Invalid amount: 12.345");

    let mut body = asha(json!(10));
    body["email"] = json!("asha@example");
    let res = shop.send(initiation(body)).await;
    assert_eq!(res.error(), "Invalid email format");

    let req = TestRequest::post()
        .uri("/payment/gateway/create")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json");
    let res = shop.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    shop.tear_down().await;
}

#[actix_web::test]
async fn initiation_without_gateway_keys() {
    let mut shop = TestShop::new().await;
    shop.keys = GatewayKeys::new(None);
    let res = shop.send(initiation(asha(json!(1600)))).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error(), "Payment gateway keys not configured on server");
    shop.tear_down().await;
}
