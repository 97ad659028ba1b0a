use crate::models::{Supplier, SupplierInput};
use sqlx::PgPool;

const SUPPLIER_COLUMNS: &str =
    "id, name, contact, phone, has_dlc, automatic_reconciliation, requires_control, created_at";

pub async fn list_suppliers(pool: &PgPool) -> Result<Vec<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(&format!(
        "SELECT {} FROM suppliers ORDER BY name",
        SUPPLIER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_supplier(pool: &PgPool, id: i64) -> Result<Option<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(&format!(
        "SELECT {} FROM suppliers WHERE id = $1",
        SUPPLIER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Suppliers by id, for attaching relations
pub async fn suppliers_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(&format!(
        "SELECT {} FROM suppliers WHERE id = ANY($1)",
        SUPPLIER_COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn insert_supplier(pool: &PgPool, input: &SupplierInput) -> Result<Supplier, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(&format!(
        r#"
        INSERT INTO suppliers (name, contact, phone, has_dlc, automatic_reconciliation, requires_control)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        SUPPLIER_COLUMNS
    ))
    .bind(&input.name)
    .bind(&input.contact)
    .bind(&input.phone)
    .bind(input.has_dlc)
    .bind(input.automatic_reconciliation)
    .bind(input.requires_control)
    .fetch_one(pool)
    .await
}

pub async fn update_supplier(
    pool: &PgPool,
    id: i64,
    input: &SupplierInput,
) -> Result<Option<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(&format!(
        r#"
        UPDATE suppliers
        SET name = $2, contact = $3, phone = $4, has_dlc = $5,
            automatic_reconciliation = $6, requires_control = $7
        WHERE id = $1
        RETURNING {}
        "#,
        SUPPLIER_COLUMNS
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.contact)
    .bind(&input.phone)
    .bind(input.has_dlc)
    .bind(input.automatic_reconciliation)
    .bind(input.requires_control)
    .fetch_optional(pool)
    .await
}

pub async fn delete_supplier(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
