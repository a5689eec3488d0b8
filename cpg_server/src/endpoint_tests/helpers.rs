use std::collections::HashMap;

use actix_web::{
    http::{header::LOCATION, header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{DateTime, TimeZone, Utc};
use cpg_common::Secret;
use cpg_engine::{
    db_types::{CartLine, Customer, Money, Order, OrderItem, OrderStatusType, PaymentMethod, ShippingAddress},
    events::EventProducers,
    test_utils::prepare_env::{drop_database, fresh_database},
    OrderFlowApi,
    RequestDeduplicator,
    SqliteDatabase,
    TransactionApi,
    TransactionAuthenticator,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;

use crate::{
    auth::{JwtClaims, TokenVerifier},
    config::{AuthConfig, GatewayKeys, GatewayOptions, GatewayUrls, UrlOverrides},
    routes::{
        gateway_redirect,
        CreateCodOrderRoute,
        GatewayCallbackRoute,
        InitiatePaymentRoute,
        MyOrdersRoute,
        VerifyPaymentRoute,
    },
};

// Test-only secrets. DO NOT re-use these anywhere.
pub const JWT_SECRET: &str = "endpoint-tests-jwt-secret";
pub const MERCHANT_KEY: &str = "tEsTkEy";
pub const MERCHANT_SALT: &str = "tEsTsAlT";

pub fn issue_token(user_id: i64, expiry: DateTime<Utc>) -> String {
    let claims = JwtClaims { user_id, exp: expiry.timestamp() as usize };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).expect("Failed to sign token")
}

pub fn valid_token(user_id: i64) -> String {
    issue_token(user_id, Utc::now() + chrono::Duration::days(7))
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub fn authenticator() -> TransactionAuthenticator {
    TransactionAuthenticator::new(Secret::new(MERCHANT_KEY.to_string()), Secret::new(MERCHANT_SALT.to_string()))
}

pub fn gateway_options() -> GatewayOptions {
    GatewayOptions {
        product_info: "Order".to_string(),
        urls: GatewayUrls::resolve(
            Some("https://api.shop.example"),
            Some("https://shop.example"),
            80,
            UrlOverrides::default(),
        ),
        ip_whitelist: None,
        use_x_forwarded_for: false,
        use_forwarded: false,
        retry_after_secs: 60,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }

    /// Splits the `Location` header of a redirect into the target page and its query parameters.
    pub fn redirect(&self) -> (String, HashMap<String, String>) {
        assert_eq!(self.status, StatusCode::FOUND, "Expected a redirect, got {}: {}", self.status, self.body);
        let location = self.headers.get(LOCATION).expect("No Location header").to_str().unwrap();
        let url = url::Url::parse(location).expect("Location is not a URL");
        let params = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        let page = format!("{}://{}{}", url.scheme(), url.host_str().unwrap_or_default(), url.path());
        (page, params)
    }
}

/// Sends `req` to an app built by `configure`. A token verifier for [`JWT_SECRET`] is always registered.
pub async fn send<F>(req: TestRequest, configure: F) -> TestResponse
where F: FnOnce(&mut ServiceConfig) {
    let verifier = TokenVerifier::new(&AuthConfig::new(JWT_SECRET));
    let app = App::new().app_data(web::Data::new(verifier)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    TestResponse { status, headers, body }
}

pub fn sample_order(user_id: i64) -> Order {
    Order {
        id: 1,
        user_id: Some(user_id),
        items: vec![OrderItem { product_id: 3, quantity: 2, unit_price: Money::from_major(800) }],
        total_amount: Money::from_major(1600),
        currency: "INR".to_string(),
        payment_method: PaymentMethod::Gateway,
        status: OrderStatusType::Paid,
        external_txn_id: Some("txn_sample".into()),
        external_payment_ref: Some("mih_sample".into()),
        shipping_address: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
    }
}

/// A storefront backed by a fresh SQLite database, with every checkout route mounted.
pub struct TestShop {
    pub url: String,
    pub db: SqliteDatabase,
    pub dedup: RequestDeduplicator,
    pub options: GatewayOptions,
    pub keys: GatewayKeys,
}

impl TestShop {
    pub async fn new() -> Self {
        let (url, db) = fresh_database().await;
        Self {
            url,
            db,
            dedup: RequestDeduplicator::default(),
            options: gateway_options(),
            keys: GatewayKeys::new(Some(authenticator())),
        }
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) + 'static {
        let db = self.db.clone();
        let dedup = self.dedup.clone();
        let options = self.options.clone();
        let keys = self.keys.clone();
        move |cfg| {
            cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone(), EventProducers::default())))
                .app_data(web::Data::new(TransactionApi::new(db)))
                .app_data(web::Data::new(dedup))
                .app_data(web::Data::new(options))
                .app_data(web::Data::new(keys))
                .service(InitiatePaymentRoute::<SqliteDatabase>::new())
                .service(GatewayCallbackRoute::<SqliteDatabase>::new())
                .service(gateway_redirect)
                .service(VerifyPaymentRoute::<SqliteDatabase>::new())
                .service(CreateCodOrderRoute::<SqliteDatabase>::new())
                .service(MyOrdersRoute::<SqliteDatabase>::new());
        }
    }

    pub async fn send(&self, req: TestRequest) -> TestResponse {
        send(req, self.configure()).await
    }

    pub async fn tear_down(self) {
        drop_database(&self.url, self.db).await;
    }

    /// A customer with a saved address and two 1000 rupee kurtas at 20% off in their cart (1600.00 in total).
    pub async fn shopper_with_kurtas(&self, name: &str, email: &str) -> Customer {
        let customer = self.db.add_customer(name, email, Some("9876543210")).await.expect("Error adding customer");
        self.db.save_shipping_address(customer.id, &address_for(name)).await.expect("Error saving address");
        let kurta = self.db.add_product("Kurta", None, Money::from_major(1000), 20).await.expect("Error adding product");
        self.db.add_to_cart(customer.id, CartLine::new(kurta, 2)).await.expect("Error adding to cart");
        customer
    }

    pub async fn order_count(&self, txn_id: &str) -> i64 {
        self.db.count_orders_for_txn_id(&txn_id.into()).await.expect("Error counting orders")
    }
}

pub fn address_for(name: &str) -> ShippingAddress {
    ShippingAddress {
        full_name: name.to_string(),
        mobile_number: "9876543210".to_string(),
        pincode: "400001".to_string(),
        locality: "Fort".to_string(),
        address: "3 Horniman Circle".to_string(),
        city: "Mumbai".to_string(),
        state: "Maharashtra".to_string(),
        landmark: None,
        alternate_phone: None,
        address_type: Some("work".to_string()),
    }
}
