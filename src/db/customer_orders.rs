use crate::models::{CustomerOrder, CustomerOrderInput};
use sqlx::PgPool;

const CUSTOMER_ORDER_COLUMNS: &str = "id, group_id, supplier_id, customer_name, product_designation, \
     quantity, status, deposit, created_by, created_at";

pub async fn list_customer_orders(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
) -> Result<Vec<CustomerOrder>, sqlx::Error> {
    sqlx::query_as::<_, CustomerOrder>(&format!(
        r#"
        SELECT {}
        FROM customer_orders
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
        ORDER BY created_at DESC, id DESC
        "#,
        CUSTOMER_ORDER_COLUMNS
    ))
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

pub async fn insert_customer_order(
    pool: &PgPool,
    input: &CustomerOrderInput,
    created_by: i64,
) -> Result<CustomerOrder, sqlx::Error> {
    sqlx::query_as::<_, CustomerOrder>(&format!(
        r#"
        INSERT INTO customer_orders (group_id, supplier_id, customer_name, product_designation,
                                     quantity, deposit, created_by)
        VALUES ($1, $2, $3, $4, COALESCE($5, 1), $6, $7)
        RETURNING {}
        "#,
        CUSTOMER_ORDER_COLUMNS
    ))
    .bind(input.group_id)
    .bind(input.supplier_id)
    .bind(&input.customer_name)
    .bind(&input.product_designation)
    .bind(input.quantity)
    .bind(&input.deposit)
    .bind(created_by)
    .fetch_one(pool)
    .await
}
