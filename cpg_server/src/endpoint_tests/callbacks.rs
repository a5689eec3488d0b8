use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use actix_web::test::TestRequest;
use cpg_engine::{
    db_types::{CartLine, Money, OrderStatusType, PaymentMethod, TransactionId},
    traits::{CartManagement, OrderManagement},
    PaymentRequest,
    TransactionApi,
    VerificationFields,
};

use super::helpers::{authenticator, TestShop};
use crate::config::GatewayKeys;

const SUCCESS_PAGE: &str = "https://shop.example/payment-success";
const FAILURE_PAGE: &str = "https://shop.example/payment-fail";

struct Callback {
    txnid: String,
    amount: String,
    firstname: String,
    email: String,
    status: String,
    extra: Vec<(&'static str, String)>,
}

impl Callback {
    fn success(txnid: &str, amount: &str, firstname: &str, email: &str) -> Self {
        Self {
            txnid: txnid.into(),
            amount: amount.into(),
            firstname: firstname.into(),
            email: email.into(),
            status: "success".into(),
            extra: vec![("mihpayid", "403993715531".into()), ("bank_ref_num", "BRN778".into())],
        }
    }

    fn digest(&self) -> String {
        authenticator().sign(
            &VerificationFields {
                txn_id: &self.txnid,
                amount: &self.amount,
                product_info: "Order",
                payer_name: &self.firstname,
                payer_email: &self.email,
                status: &self.status,
            }
            .into(),
        )
    }

    fn form(&self, hash: String) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("key", super::helpers::MERCHANT_KEY.to_string()),
            ("txnid", self.txnid.clone()),
            ("amount", self.amount.clone()),
            ("productinfo", "Order".to_string()),
            ("firstname", self.firstname.clone()),
            ("email", self.email.clone()),
            ("status", self.status.clone()),
            ("udf1", String::new()),
            ("hash", hash),
        ];
        form.extend(self.extra.iter().cloned());
        form
    }

    fn signed(&self) -> TestRequest {
        self.post(self.form(self.digest()))
    }

    fn post(&self, form: Vec<(&'static str, String)>) -> TestRequest {
        TestRequest::post().uri("/payment/gateway/callback").set_form(form)
    }
}

async fn initiate(shop: &TestShop, user_id: Option<i64>, name: &str, email: &str, amount: &str) -> String {
    let request = PaymentRequest {
        amount: amount.to_string(),
        payer_name: name.to_string(),
        payer_email: email.to_string(),
        payer_phone: "9876543210".to_string(),
        product_info: "Order".to_string(),
        user_id,
    };
    let signed = TransactionApi::new(shop.db.clone()).initiate(&authenticator(), request).await.unwrap();
    signed.txn_id.0
}

#[actix_web::test]
async fn verified_success_creates_exactly_one_order() {
    let shop = TestShop::new().await;
    let asha = shop.shopper_with_kurtas("Asha", "asha@example.com").await;
    let txnid = initiate(&shop, Some(asha.id), "Asha", "asha@example.com", "1600.00").await;
    let callback = Callback::success(&txnid, "1600.00", "Asha", "asha@example.com");

    let res = shop.send(callback.signed()).await;
    let (page, params) = res.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    assert_eq!(params["txnid"], txnid);
    assert_eq!(params["status"], "success");
    assert_eq!(params["mihpayid"], "403993715531");
    assert_eq!(params["bank_ref_num"], "BRN778");

    let order = shop.db.fetch_order_by_txn_id(&TransactionId::from(txnid.as_str())).await.unwrap().unwrap();
    assert_eq!(order.user_id, Some(asha.id));
    assert_eq!(order.total_amount, Money::from_major(1600));
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_method, PaymentMethod::Gateway);
    assert_eq!(order.external_payment_ref.as_deref(), Some("403993715531"));
    assert!(shop.db.fetch_cart(asha.id).await.unwrap().is_empty());

    // the gateway retries its callbacks
    let res = shop.send(callback.signed()).await;
    let (page, _) = res.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    assert_eq!(shop.order_count(&txnid).await, 1);
    shop.tear_down().await;
}

#[actix_web::test]
async fn tampered_callbacks_are_rejected() {
    let shop = TestShop::new().await;
    let asha = shop.shopper_with_kurtas("Asha", "asha@example.com").await;
    let txnid = initiate(&shop, Some(asha.id), "Asha", "asha@example.com", "1600.00").await;
    let callback = Callback::success(&txnid, "1600.00", "Asha", "asha@example.com");
    let mut form = callback.form(callback.digest());
    // pay 1 rupee, claim 1600
    form.iter_mut().filter(|(k, _)| *k == "amount").for_each(|(_, v)| *v = "1.00".to_string());

    let res = shop.send(callback.post(form)).await;
    let (page, params) = res.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["txnid"], txnid);
    assert_eq!(params["error"], "Invalid hash verification");
    assert_eq!(shop.order_count(&txnid).await, 0);
    assert_eq!(shop.db.fetch_cart(asha.id).await.unwrap().len(), 1);
    shop.tear_down().await;
}

#[actix_web::test]
async fn signed_failures_redirect_with_the_gateway_reason() {
    let shop = TestShop::new().await;
    let mut callback = Callback::success("txn_declined", "99", "Ravi", "ravi@example.com");
    callback.status = "failure".into();
    callback.extra = vec![("error", "E308".into()), ("error_Message", "Bank declined the transaction".into())];

    let res = shop.send(callback.signed()).await;
    let (page, params) = res.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["status"], "failure");
    assert_eq!(params["error"], "Bank declined the transaction");
    assert_eq!(shop.order_count("txn_declined").await, 0);

    callback.extra = vec![];
    let res = shop.send(callback.signed()).await;
    let (_, params) = res.redirect();
    assert_eq!(params["error"], "Payment failed");
    shop.tear_down().await;
}

#[actix_web::test]
async fn incomplete_callbacks() {
    let shop = TestShop::new().await;
    let callback = Callback::success("txn_partial", "99", "Ravi", "ravi@example.com");
    let form = callback.form(callback.digest()).into_iter().filter(|(k, _)| *k != "email").collect();
    let res = shop.send(callback.post(form)).await;
    let (page, params) = res.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["txnid"], "txn_partial");
    assert_eq!(params["error"], "Missing required fields");

    let req = TestRequest::post().uri("/payment/gateway/callback").set_payload("garbage");
    let (page, params) = shop.send(req).await.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["error"], "Invalid callback data");
    shop.tear_down().await;
}

#[actix_web::test]
async fn callbacks_without_gateway_keys() {
    let mut shop = TestShop::new().await;
    shop.keys = GatewayKeys::new(None);
    let callback = Callback::success("txn_nokeys", "99", "Ravi", "ravi@example.com");
    let (page, params) = shop.send(callback.signed()).await.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["error"], "Server configuration error");
    assert_eq!(shop.order_count("txn_nokeys").await, 0);
    shop.tear_down().await;
}

#[actix_web::test]
async fn callbacks_from_outside_the_whitelist() {
    let mut shop = TestShop::new().await;
    shop.options.ip_whitelist = Some(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
    let callback = Callback::success("txn_spoofed", "99", "Ravi", "ravi@example.com");

    let req = callback.signed().peer_addr(SocketAddr::from(([192, 168, 1, 20], 5000)));
    let (page, params) = shop.send(req).await.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["error"], "Unauthorized callback source");
    assert_eq!(shop.order_count("txn_spoofed").await, 0);

    let req = callback.signed().peer_addr(SocketAddr::from(([10, 0, 0, 1], 5000)));
    let (page, _) = shop.send(req).await.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    assert_eq!(shop.order_count("txn_spoofed").await, 1);
    shop.tear_down().await;
}

#[actix_web::test]
async fn unmatched_payers_become_unattributed_orders() {
    let shop = TestShop::new().await;
    let callback = Callback::success("txn_stranger", "750.50", "Meera", "meera@example.com");
    let (page, _) = shop.send(callback.signed()).await.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    let order = shop.db.fetch_order_by_txn_id(&"txn_stranger".into()).await.unwrap().unwrap();
    assert!(order.is_unattributed());
    assert_eq!(order.total_amount, "750.50".parse::<Money>().unwrap());
    assert!(order.items.is_empty());
    shop.tear_down().await;
}

#[actix_web::test]
async fn paid_orders_do_not_need_a_saved_address() {
    let shop = TestShop::new().await;
    let meera = shop.db.add_customer("Meera", "meera@example.com", None).await.unwrap();
    let kurta = shop.db.add_product("Kurta", None, Money::from_major(1000), 20).await.unwrap();
    shop.db.add_to_cart(meera.id, CartLine::new(kurta, 2)).await.unwrap();
    let callback = Callback::success("txn_no_address", "1600.00", "Meera", "meera@example.com");

    let (page, params) = shop.send(callback.signed()).await.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    assert_eq!(params["txnid"], "txn_no_address");
    let order = shop.db.fetch_order_by_txn_id(&"txn_no_address".into()).await.unwrap().unwrap();
    assert_eq!(order.user_id, Some(meera.id));
    assert_eq!(order.total_amount, Money::from_major(1600));
    assert!(order.shipping_address.is_none());
    assert!(shop.db.fetch_cart(meera.id).await.unwrap().is_empty());

    // paying again with an emptied cart still leaves a record of the money
    let callback = Callback::success("txn_second_payment", "1600.00", "Meera", "meera@example.com");
    let (page, _) = shop.send(callback.signed()).await.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    let order = shop.db.fetch_order_by_txn_id(&"txn_second_payment".into()).await.unwrap().unwrap();
    assert_eq!(order.user_id, Some(meera.id));
    assert!(order.items.is_empty());
    assert_eq!(order.total_amount, Money::from_major(1600));
    shop.tear_down().await;
}

#[actix_web::test]
async fn browser_redirects_never_create_orders() {
    let shop = TestShop::new().await;
    let asha = shop.shopper_with_kurtas("Asha", "asha@example.com").await;
    let txnid = initiate(&shop, Some(asha.id), "Asha", "asha@example.com", "1600.00").await;

    let uri = format!("/payment/gateway/callback?txnid={txnid}&status=success&mihpayid=4039");
    let (page, params) = shop.send(TestRequest::get().uri(&uri)).await.redirect();
    assert_eq!(page, SUCCESS_PAGE);
    assert_eq!(params["txnid"], txnid);
    assert_eq!(params["mihpayid"], "4039");
    assert_eq!(shop.order_count(&txnid).await, 0);
    assert_eq!(shop.db.fetch_cart(asha.id).await.unwrap().len(), 1);

    let uri = format!("/payment/gateway/callback?txnid={txnid}&status=failure&error=E500");
    let (page, params) = shop.send(TestRequest::get().uri(&uri)).await.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["error"], "E500");

    let (page, params) = shop.send(TestRequest::get().uri("/payment/gateway/callback")).await.redirect();
    assert_eq!(page, FAILURE_PAGE);
    assert_eq!(params["status"], "failed");
    assert_eq!(params["error"], "Invalid callback data");
    shop.tear_down().await;
}
