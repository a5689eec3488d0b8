use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, ShippingAddress},
    traits::StorageError,
};

pub async fn fetch_customer(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Customer>, StorageError> {
    let customer = sqlx::query_as("SELECT id, name, email, phone FROM customers WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(customer)
}

pub async fn fetch_customers_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Vec<Customer>, StorageError> {
    let customers =
        sqlx::query_as("SELECT id, name, email, phone FROM customers WHERE email = $1 COLLATE NOCASE ORDER BY id")
            .bind(email.trim())
            .fetch_all(conn)
            .await?;
    Ok(customers)
}

pub async fn insert_customer(
    name: &str,
    email: &str,
    phone: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Customer, StorageError> {
    let customer = sqlx::query_as(
        "INSERT INTO customers (name, email, phone) VALUES ($1, $2, $3) RETURNING id, name, email, phone",
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .fetch_one(conn)
    .await?;
    Ok(customer)
}

pub async fn fetch_shipping_address(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ShippingAddress>, StorageError> {
    let address = sqlx::query_as(
        r#"
        SELECT full_name, mobile_number, pincode, locality, address, city, state, landmark, alternate_phone, address_type
        FROM addresses WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(address)
}

/// Each customer has a single address book entry; saving replaces it.
pub async fn upsert_shipping_address(
    user_id: i64,
    address: &ShippingAddress,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO addresses (
            user_id, full_name, mobile_number, pincode, locality, address, city, state, landmark, alternate_phone,
            address_type
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (user_id) DO UPDATE SET
            full_name = excluded.full_name,
            mobile_number = excluded.mobile_number,
            pincode = excluded.pincode,
            locality = excluded.locality,
            address = excluded.address,
            city = excluded.city,
            state = excluded.state,
            landmark = excluded.landmark,
            alternate_phone = excluded.alternate_phone,
            address_type = excluded.address_type,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(user_id)
    .bind(&address.full_name)
    .bind(&address.mobile_number)
    .bind(&address.pincode)
    .bind(&address.locality)
    .bind(&address.address)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.landmark)
    .bind(&address.alternate_phone)
    .bind(&address.address_type)
    .execute(conn)
    .await?;
    Ok(())
}
