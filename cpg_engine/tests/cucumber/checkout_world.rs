use std::{collections::HashMap, fmt::Debug};

use cpg_engine::{
    db_types::{Customer, Order},
    events::EventProducers,
    CheckoutError,
    OrderFlowApi,
    SqliteDatabase,
};
use cucumber::World;

use crate::support::TestStore;

#[derive(Debug, Default, World)]
pub struct CheckoutWorld {
    pub system: Option<CheckoutSystem>,
    pub last_result: Option<Result<Order, CheckoutError>>,
}

impl CheckoutWorld {
    pub fn system(&self) -> &CheckoutSystem {
        self.system.as_ref().expect("Scenario must start with 'Given a fresh install'")
    }

    pub fn system_mut(&mut self) -> &mut CheckoutSystem {
        self.system.as_mut().expect("Scenario must start with 'Given a fresh install'")
    }

    pub fn last_order(&self) -> &Order {
        match &self.last_result {
            Some(Ok(order)) => order,
            Some(Err(e)) => panic!("Expected an order, but materialization failed: {e}"),
            None => panic!("No order has been materialized in this scenario"),
        }
    }
}

pub struct CheckoutSystem {
    pub store: TestStore,
    pub api: OrderFlowApi<SqliteDatabase>,
    pub customers: HashMap<String, Customer>,
    pub products: HashMap<String, i64>,
}

impl Debug for CheckoutSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutSystem ({})", self.store.url)
    }
}

impl CheckoutSystem {
    pub async fn new() -> Self {
        let store = TestStore::new().await;
        let api = OrderFlowApi::new(store.db.clone(), EventProducers::default());
        Self { store, api, customers: HashMap::new(), products: HashMap::new() }
    }

    pub fn customer(&self, name: &str) -> &Customer {
        self.customers.get(name).unwrap_or_else(|| panic!("Customer {name} has not been set up"))
    }

    pub fn product(&self, name: &str) -> i64 {
        *self.products.get(name).unwrap_or_else(|| panic!("Product {name} has not been set up"))
    }
}
