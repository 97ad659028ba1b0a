use crate::models::{Order, OrderStatus};
use chrono::NaiveDate;
use sqlx::PgPool;

const ORDER_COLUMNS: &str =
    "id, supplier_id, group_id, planned_date, quantity, unit, status, notes, created_by, created_at";

/// Orders of the given stores (`None` = all) planned within `[from, to]`
pub async fn list_orders(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        r#"
        SELECT {}
        FROM orders
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
          AND ($2::date IS NULL OR planned_date >= $2)
          AND ($3::date IS NULL OR planned_date <= $3)
        ORDER BY planned_date, id
        "#,
        ORDER_COLUMNS
    ))
    .bind(group_ids)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_order(pool: &PgPool, order: &Order) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        r#"
        INSERT INTO orders (supplier_id, group_id, planned_date, quantity, unit, status, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(order.supplier_id)
    .bind(order.group_id)
    .bind(order.planned_date)
    .bind(order.quantity)
    .bind(&order.unit)
    .bind(order.status)
    .bind(&order.notes)
    .bind(order.created_by)
    .fetch_one(pool)
    .await
}

pub async fn update_order(pool: &PgPool, order: &Order) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        r#"
        UPDATE orders
        SET supplier_id = $2, planned_date = $3, quantity = $4, unit = $5, status = $6, notes = $7
        WHERE id = $1
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.supplier_id)
    .bind(order.planned_date)
    .bind(order.quantity)
    .bind(&order.unit)
    .bind(order.status)
    .bind(&order.notes)
    .fetch_optional(pool)
    .await
}

pub async fn set_order_status(
    pool: &PgPool,
    id: i64,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_order(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
