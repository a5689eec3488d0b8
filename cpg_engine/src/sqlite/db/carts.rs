use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{CartLine, Money, ProductPricing},
    traits::StorageError,
};

/// Returns the cart lines for the user in insertion order.
pub async fn fetch_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, StorageError> {
    let lines = sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY id")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn clear_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(conn).await?;
    let n = result.rows_affected();
    debug!("🗃️ Cleared {n} cart lines for user {user_id}");
    Ok(n)
}

pub async fn add_to_cart(user_id: i64, line: CartLine, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .execute(conn)
        .await?;
    trace!("🗃️ Added {} x product {} to cart of user {user_id}", line.quantity, line.product_id);
    Ok(())
}

pub async fn fetch_product_pricing(
    product_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductPricing>, StorageError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder =
        QueryBuilder::new("SELECT id AS product_id, name, price, mrp, discount_percent FROM products WHERE id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<ProductPricing>().fetch_all(conn).await?;
    Ok(products)
}

/// Inserts a product and returns its id. `price` takes precedence over `mrp`/`discount_percent` when pricing carts.
pub async fn insert_product(
    name: &str,
    price: Option<Money>,
    mrp: Money,
    discount_percent: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, StorageError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, price, mrp, discount_percent) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(name)
    .bind(price.map(|p| p.value()))
    .bind(mrp.value())
    .bind(discount_percent)
    .fetch_one(conn)
    .await?;
    Ok(id)
}
