#![allow(dead_code)]
//! Shared fixtures for the engine integration tests.
use cpg_engine::{
    db_types::{CartLine, Customer, Money, ShippingAddress},
    test_utils::prepare_env::{drop_database, fresh_database},
    SqliteDatabase,
};

pub struct TestStore {
    pub url: String,
    pub db: SqliteDatabase,
}

impl TestStore {
    pub async fn new() -> Self {
        let (url, db) = fresh_database().await;
        Self { url, db }
    }

    pub async fn tear_down(self) {
        drop_database(&self.url, self.db).await;
    }

    pub async fn customer(&self, name: &str, email: &str) -> Customer {
        self.db.add_customer(name, email, Some("9876543210")).await.expect("Error adding customer")
    }

    /// A customer with a saved address and nothing in their cart.
    pub async fn shopper(&self, name: &str, email: &str) -> Customer {
        let customer = self.customer(name, email).await;
        self.db.save_shipping_address(customer.id, &address_for(name)).await.expect("Error saving address");
        customer
    }

    pub async fn product(&self, name: &str, mrp_rupees: i64, discount_percent: i64) -> i64 {
        self.db
            .add_product(name, None, Money::from_major(mrp_rupees), discount_percent)
            .await
            .expect("Error adding product")
    }

    pub async fn add_to_cart(&self, user_id: i64, product_id: i64, quantity: i64) {
        self.db.add_to_cart(user_id, CartLine::new(product_id, quantity)).await.expect("Error adding to cart");
    }

    /// The canonical test basket: two units of a 1000 rupee item at 20% off.
    pub async fn shopper_with_kurtas(&self, name: &str, email: &str) -> Customer {
        let customer = self.shopper(name, email).await;
        let kurta = self.product("Kurta", 1000, 20).await;
        self.add_to_cart(customer.id, kurta, 2).await;
        customer
    }
}

pub fn address_for(name: &str) -> ShippingAddress {
    ShippingAddress {
        full_name: name.to_string(),
        mobile_number: "9876543210".to_string(),
        pincode: "560001".to_string(),
        locality: "MG Road".to_string(),
        address: "12 Residency Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        landmark: Some("Opposite the park".to_string()),
        alternate_phone: None,
        address_type: Some("home".to_string()),
    }
}
