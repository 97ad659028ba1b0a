use crate::models::VerificationCacheEntry;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn get_cache_entry(
    pool: &PgPool,
    group_id: i64,
    cache_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<VerificationCacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, VerificationCacheEntry>(
        r#"
        SELECT group_id, cache_key, exists, match_type, invoice_reference, invoice_amount,
               due_date, error_message, created_at, expires_at
        FROM invoice_verification_cache
        WHERE group_id = $1 AND cache_key = $2 AND expires_at > $3
        "#,
    )
    .bind(group_id)
    .bind(cache_key)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_cache_entry(
    pool: &PgPool,
    entry: &VerificationCacheEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO invoice_verification_cache
            (group_id, cache_key, exists, match_type, invoice_reference, invoice_amount,
             due_date, error_message, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (group_id, cache_key) DO UPDATE
        SET exists = EXCLUDED.exists,
            match_type = EXCLUDED.match_type,
            invoice_reference = EXCLUDED.invoice_reference,
            invoice_amount = EXCLUDED.invoice_amount,
            due_date = EXCLUDED.due_date,
            error_message = EXCLUDED.error_message,
            created_at = EXCLUDED.created_at,
            expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(entry.group_id)
    .bind(&entry.cache_key)
    .bind(entry.exists)
    .bind(entry.match_type)
    .bind(&entry.invoice_reference)
    .bind(&entry.invoice_amount)
    .bind(entry.due_date)
    .bind(&entry.error_message)
    .bind(entry.created_at)
    .bind(entry.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_cache_entry(
    pool: &PgPool,
    group_id: i64,
    cache_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM invoice_verification_cache WHERE group_id = $1 AND cache_key = $2")
        .bind(group_id)
        .bind(cache_key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn purge_expired_cache(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM invoice_verification_cache WHERE expires_at <= $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
