use crate::models::{NocodbConfig, NocodbConfigInput};
use sqlx::PgPool;

const CONFIG_COLUMNS: &str = "id, name, base_url, project_id, api_token, is_active, created_at";

pub async fn list_configs(pool: &PgPool) -> Result<Vec<NocodbConfig>, sqlx::Error> {
    sqlx::query_as::<_, NocodbConfig>(&format!(
        "SELECT {} FROM nocodb_config ORDER BY name",
        CONFIG_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_config(pool: &PgPool, id: i64) -> Result<Option<NocodbConfig>, sqlx::Error> {
    sqlx::query_as::<_, NocodbConfig>(&format!(
        "SELECT {} FROM nocodb_config WHERE id = $1",
        CONFIG_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn configs_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<NocodbConfig>, sqlx::Error> {
    sqlx::query_as::<_, NocodbConfig>(&format!(
        "SELECT {} FROM nocodb_config WHERE id = ANY($1)",
        CONFIG_COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn insert_config(
    pool: &PgPool,
    input: &NocodbConfigInput,
) -> Result<NocodbConfig, sqlx::Error> {
    sqlx::query_as::<_, NocodbConfig>(&format!(
        r#"
        INSERT INTO nocodb_config (name, base_url, project_id, api_token, is_active)
        VALUES ($1, $2, $3, COALESCE($4, ''), $5)
        RETURNING {}
        "#,
        CONFIG_COLUMNS
    ))
    .bind(&input.name)
    .bind(&input.base_url)
    .bind(&input.project_id)
    .bind(&input.api_token)
    .bind(input.is_active)
    .fetch_one(pool)
    .await
}

/// A missing token keeps the stored one
pub async fn update_config(
    pool: &PgPool,
    id: i64,
    input: &NocodbConfigInput,
) -> Result<Option<NocodbConfig>, sqlx::Error> {
    sqlx::query_as::<_, NocodbConfig>(&format!(
        r#"
        UPDATE nocodb_config
        SET name = $2, base_url = $3, project_id = $4,
            api_token = COALESCE($5, api_token), is_active = $6
        WHERE id = $1
        RETURNING {}
        "#,
        CONFIG_COLUMNS
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.base_url)
    .bind(&input.project_id)
    .bind(&input.api_token)
    .bind(input.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_config(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM nocodb_config WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
