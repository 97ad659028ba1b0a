use crate::models::DlcProduct;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const DLC_COLUMNS: &str = "id, group_id, supplier_id, product_name, gencode, dlc_date, date_type, \
     quantity, unit, location, alert_threshold, status, stock_epuise, validated_at, validated_by, \
     created_by, created_at";

pub async fn list_dlc_products(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
) -> Result<Vec<DlcProduct>, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        r#"
        SELECT {}
        FROM dlc_products
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
        ORDER BY dlc_date, id
        "#,
        DLC_COLUMNS
    ))
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

pub async fn get_dlc_product(pool: &PgPool, id: i64) -> Result<Option<DlcProduct>, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        "SELECT {} FROM dlc_products WHERE id = $1",
        DLC_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_dlc_product(pool: &PgPool, p: &DlcProduct) -> Result<DlcProduct, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        r#"
        INSERT INTO dlc_products (group_id, supplier_id, product_name, gencode, dlc_date, date_type,
                                  quantity, unit, location, alert_threshold, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        DLC_COLUMNS
    ))
    .bind(p.group_id)
    .bind(p.supplier_id)
    .bind(&p.product_name)
    .bind(&p.gencode)
    .bind(p.dlc_date)
    .bind(p.date_type)
    .bind(p.quantity)
    .bind(&p.unit)
    .bind(&p.location)
    .bind(p.alert_threshold)
    .bind(p.created_by)
    .fetch_one(pool)
    .await
}

pub async fn update_dlc_product(
    pool: &PgPool,
    p: &DlcProduct,
) -> Result<Option<DlcProduct>, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        r#"
        UPDATE dlc_products
        SET product_name = $2, gencode = $3, dlc_date = $4, date_type = $5, quantity = $6,
            unit = $7, location = $8, alert_threshold = $9
        WHERE id = $1
        RETURNING {}
        "#,
        DLC_COLUMNS
    ))
    .bind(p.id)
    .bind(&p.product_name)
    .bind(&p.gencode)
    .bind(p.dlc_date)
    .bind(p.date_type)
    .bind(p.quantity)
    .bind(&p.unit)
    .bind(&p.location)
    .bind(p.alert_threshold)
    .fetch_optional(pool)
    .await
}

pub async fn validate_dlc_product(
    pool: &PgPool,
    id: i64,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<Option<DlcProduct>, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        r#"
        UPDATE dlc_products
        SET status = 'validated', validated_at = $3, validated_by = $2
        WHERE id = $1
        RETURNING {}
        "#,
        DLC_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .bind(at)
    .fetch_optional(pool)
    .await
}

pub async fn set_stock_epuise(
    pool: &PgPool,
    id: i64,
    stock_epuise: bool,
) -> Result<Option<DlcProduct>, sqlx::Error> {
    sqlx::query_as::<_, DlcProduct>(&format!(
        "UPDATE dlc_products SET stock_epuise = $2 WHERE id = $1 RETURNING {}",
        DLC_COLUMNS
    ))
    .bind(id)
    .bind(stock_epuise)
    .fetch_optional(pool)
    .await
}

pub async fn delete_dlc_product(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM dlc_products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
