use crate::models::{
    Delivery, DeliveryFilter, DeliveryWithRelations, InvoiceBackfill, References,
    VerificationStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};

use super::{configs_by_ids, groups_by_ids, suppliers_by_ids};

const DELIVERY_COLUMNS: &str = "id, order_id, supplier_id, group_id, scheduled_date, delivered_date, \
     quantity, unit, status, notes, bl_number, bl_amount, invoice_reference, invoice_amount, \
     due_date, reconciled, validated_at, verification_status, last_verified_at, created_by, \
     created_at, updated_at";

/// Scheduled-date range and status filter
pub async fn list_deliveries(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
    filter: &DeliveryFilter,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        r#"
        SELECT {}
        FROM deliveries
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
          AND ($2::date IS NULL OR scheduled_date >= $2)
          AND ($3::date IS NULL OR scheduled_date <= $3)
          AND ($4::delivery_status IS NULL OR status = $4)
        ORDER BY scheduled_date DESC, id DESC
        "#,
        DELIVERY_COLUMNS
    ))
    .bind(group_ids)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .bind(filter.status)
    .fetch_all(pool)
    .await
}

/// Deliveries whose delivered (or else scheduled) date falls within `[from, to]`
pub async fn deliveries_in_period(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        r#"
        SELECT {}
        FROM deliveries
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
          AND COALESCE(delivered_date, scheduled_date) BETWEEN $2 AND $3
        ORDER BY COALESCE(delivered_date, scheduled_date), id
        "#,
        DELIVERY_COLUMNS
    ))
    .bind(group_ids)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Among `order_ids`, those already represented by a delivered delivery
pub async fn delivered_order_ids(pool: &PgPool, order_ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT order_id
        FROM deliveries
        WHERE order_id = ANY($1) AND status = 'delivered'
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await
}

/// Delivered deliveries of manual-reconciliation suppliers
pub async fn list_reconciliation_deliveries(
    pool: &PgPool,
    group_ids: Option<&[i64]>,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        r#"
        SELECT {}
        FROM deliveries
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
          AND status = 'delivered'
          AND supplier_id NOT IN (SELECT id FROM suppliers WHERE automatic_reconciliation)
        ORDER BY delivered_date DESC NULLS LAST, id DESC
        "#,
        DELIVERY_COLUMNS
    ))
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

pub async fn get_delivery(pool: &PgPool, id: i64) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        "SELECT {} FROM deliveries WHERE id = $1",
        DELIVERY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Attaches supplier, store and ledger config; rows whose relations vanished are dropped
pub async fn with_relations(
    pool: &PgPool,
    deliveries: Vec<Delivery>,
) -> Result<Vec<DeliveryWithRelations>, sqlx::Error> {
    if deliveries.is_empty() {
        return Ok(Vec::new());
    }

    let supplier_ids: Vec<i64> = deliveries
        .iter()
        .map(|d| d.supplier_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let group_ids: Vec<i64> = deliveries
        .iter()
        .map(|d| d.group_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let suppliers: HashMap<i64, _> = suppliers_by_ids(pool, &supplier_ids)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let groups: HashMap<i64, _> = groups_by_ids(pool, &group_ids)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();
    let config_ids: Vec<i64> = groups
        .values()
        .filter_map(|g| g.nocodb_config_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let configs: HashMap<i64, _> = configs_by_ids(pool, &config_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(deliveries
        .into_iter()
        .filter_map(|d| {
            let supplier = suppliers.get(&d.supplier_id)?.clone();
            let group = groups.get(&d.group_id)?.clone();
            let config = group
                .nocodb_config_id
                .and_then(|id| configs.get(&id).cloned());
            Some(DeliveryWithRelations::new(d, supplier, group, config))
        })
        .collect())
}

pub async fn find_with_relations(
    pool: &PgPool,
    id: i64,
) -> Result<Option<DeliveryWithRelations>, sqlx::Error> {
    let Some(delivery) = get_delivery(pool, id).await? else {
        return Ok(None);
    };
    Ok(with_relations(pool, vec![delivery]).await?.into_iter().next())
}

pub async fn insert_delivery(pool: &PgPool, d: &Delivery) -> Result<Delivery, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        r#"
        INSERT INTO deliveries (order_id, supplier_id, group_id, scheduled_date, delivered_date,
                                quantity, unit, status, notes, bl_number, bl_amount,
                                invoice_reference, invoice_amount, due_date, reconciled,
                                validated_at, verification_status, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {}
        "#,
        DELIVERY_COLUMNS
    ))
    .bind(d.order_id)
    .bind(d.supplier_id)
    .bind(d.group_id)
    .bind(d.scheduled_date)
    .bind(d.delivered_date)
    .bind(d.quantity)
    .bind(&d.unit)
    .bind(d.status)
    .bind(&d.notes)
    .bind(&d.bl_number)
    .bind(&d.bl_amount)
    .bind(&d.invoice_reference)
    .bind(&d.invoice_amount)
    .bind(d.due_date)
    .bind(d.reconciled)
    .bind(d.validated_at)
    .bind(d.verification_status)
    .bind(d.created_by)
    .fetch_one(pool)
    .await
}

/// Single-statement write of every editable column (last write wins)
pub async fn update_delivery(pool: &PgPool, d: &Delivery) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(&format!(
        r#"
        UPDATE deliveries
        SET order_id = $2, supplier_id = $3, scheduled_date = $4, delivered_date = $5,
            quantity = $6, unit = $7, status = $8, notes = $9, bl_number = $10,
            bl_amount = $11, invoice_reference = $12, invoice_amount = $13, due_date = $14,
            reconciled = $15, validated_at = $16, verification_status = $17,
            updated_at = now()
        WHERE id = $1
        RETURNING {}
        "#,
        DELIVERY_COLUMNS
    ))
    .bind(d.id)
    .bind(d.order_id)
    .bind(d.supplier_id)
    .bind(d.scheduled_date)
    .bind(d.delivered_date)
    .bind(d.quantity)
    .bind(&d.unit)
    .bind(d.status)
    .bind(&d.notes)
    .bind(&d.bl_number)
    .bind(&d.bl_amount)
    .bind(&d.invoice_reference)
    .bind(&d.invoice_amount)
    .bind(d.due_date)
    .bind(d.reconciled)
    .bind(d.validated_at)
    .bind(d.verification_status)
    .fetch_optional(pool)
    .await
}

pub async fn delete_delivery(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM deliveries WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// COALESCE keeps any value already present, including one written concurrently
pub async fn backfill_invoice(
    pool: &PgPool,
    id: i64,
    backfill: &InvoiceBackfill,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE deliveries
        SET invoice_reference = COALESCE(NULLIF(invoice_reference, ''), $2),
            invoice_amount = COALESCE(invoice_amount, $3),
            due_date = COALESCE(due_date, $4),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&backfill.invoice_reference)
    .bind(&backfill.invoice_amount)
    .bind(backfill.due_date)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn adopt_references(
    pool: &PgPool,
    id: i64,
    refs: &References,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE deliveries
        SET bl_number = COALESCE(NULLIF(bl_number, ''), $2),
            invoice_reference = COALESCE(NULLIF(invoice_reference, ''), $3),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&refs.bl_number)
    .bind(&refs.invoice_reference)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_verification(
    pool: &PgPool,
    id: i64,
    status: VerificationStatus,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE deliveries
        SET verification_status = $2, last_verified_at = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

/// `None` devalidates and sends the delivery back to `unverified`
pub async fn set_reconciled(
    pool: &PgPool,
    id: i64,
    validated_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE deliveries
        SET reconciled = $2::timestamptz IS NOT NULL,
            validated_at = $2,
            verification_status = CASE WHEN $2::timestamptz IS NULL
                                       THEN 'unverified'::verification_status
                                       ELSE verification_status END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(validated_at)
    .execute(pool)
    .await?;
    Ok(())
}
