use crate::{
    db_types::{Customer, ShippingAddress},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait CustomerDirectory {
    async fn fetch_customer(&self, user_id: i64) -> Result<Option<Customer>, StorageError>;

    /// All accounts registered under `email` (case-insensitive). Emails are not unique, so this can return several.
    async fn fetch_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, StorageError>;

    async fn fetch_shipping_address(&self, user_id: i64) -> Result<Option<ShippingAddress>, StorageError>;
}
