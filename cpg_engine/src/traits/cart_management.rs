use crate::{
    db_types::{CartLine, ProductPricing},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// The customer's cart lines, in the order they were added. An absent cart is an empty one.
    async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartLine>, StorageError>;

    /// Current pricing data for the given products. Unknown ids are silently absent from the result.
    async fn fetch_product_pricing(&self, product_ids: &[i64]) -> Result<Vec<ProductPricing>, StorageError>;
}
