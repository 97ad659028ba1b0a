use crate::models::{Group, GroupInput};
use sqlx::PgPool;

const GROUP_COLUMNS: &str = "id, name, color, nocodb_config_id, nocodb_table_id, nocodb_table_name, \
     invoice_column_name, bl_column_name, amount_column_name, supplier_column_name, \
     due_date_column_name, webhook_url, created_at";

/// `ids = None` lists every store
pub async fn list_groups(pool: &PgPool, ids: Option<&[i64]>) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        r#"
        SELECT {}
        FROM groups
        WHERE ($1::bigint[] IS NULL OR id = ANY($1))
        ORDER BY name
        "#,
        GROUP_COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn get_group(pool: &PgPool, id: i64) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {} FROM groups WHERE id = $1", GROUP_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_group(pool: &PgPool, input: &GroupInput) -> Result<Group, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        r#"
        INSERT INTO groups (name, color, nocodb_config_id, nocodb_table_id, nocodb_table_name,
                            invoice_column_name, bl_column_name, amount_column_name,
                            supplier_column_name, due_date_column_name, webhook_url)
        VALUES ($1, COALESCE($2, '#1976D2'), $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        GROUP_COLUMNS
    ))
    .bind(&input.name)
    .bind(&input.color)
    .bind(input.nocodb_config_id)
    .bind(&input.nocodb_table_id)
    .bind(&input.nocodb_table_name)
    .bind(&input.invoice_column_name)
    .bind(&input.bl_column_name)
    .bind(&input.amount_column_name)
    .bind(&input.supplier_column_name)
    .bind(&input.due_date_column_name)
    .bind(&input.webhook_url)
    .fetch_one(pool)
    .await
}

/// Full replacement of the store settings, ledger mapping included
pub async fn update_group(
    pool: &PgPool,
    id: i64,
    input: &GroupInput,
) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        r#"
        UPDATE groups
        SET name = $2, color = COALESCE($3, color), nocodb_config_id = $4,
            nocodb_table_id = $5, nocodb_table_name = $6, invoice_column_name = $7,
            bl_column_name = $8, amount_column_name = $9, supplier_column_name = $10,
            due_date_column_name = $11, webhook_url = $12
        WHERE id = $1
        RETURNING {}
        "#,
        GROUP_COLUMNS
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.color)
    .bind(input.nocodb_config_id)
    .bind(&input.nocodb_table_id)
    .bind(&input.nocodb_table_name)
    .bind(&input.invoice_column_name)
    .bind(&input.bl_column_name)
    .bind(&input.amount_column_name)
    .bind(&input.supplier_column_name)
    .bind(&input.due_date_column_name)
    .bind(&input.webhook_url)
    .fetch_optional(pool)
    .await
}

pub async fn groups_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Group>, sqlx::Error> {
    list_groups(pool, Some(ids)).await
}
