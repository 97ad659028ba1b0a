use bigdecimal::BigDecimal;

use crate::error::{AppError, AppResult};
use crate::models::DeliveryWithRelations;

const HEADER: [&str; 12] = [
    "id",
    "store",
    "supplier",
    "delivered_date",
    "bl_number",
    "bl_amount",
    "invoice_reference",
    "invoice_amount",
    "difference",
    "due_date",
    "state",
    "validated_at",
];

fn text<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// BL amount minus invoice amount, when both are known
pub fn difference(row: &DeliveryWithRelations) -> Option<BigDecimal> {
    match (&row.delivery.bl_amount, &row.delivery.invoice_amount) {
        (Some(bl), Some(invoice)) => Some(bl - invoice),
        _ => None,
    }
}

/// Reconciliation report as CSV
pub fn reconciliation_csv(rows: &[DeliveryWithRelations]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let fail = |e: csv::Error| AppError::Internal(format!("csv export failed: {}", e));

    writer.write_record(HEADER).map_err(fail)?;
    for row in rows {
        let d = &row.delivery;
        writer
            .write_record([
                d.id.to_string(),
                row.group.name.clone(),
                row.supplier.name.clone(),
                text(&d.delivered_date),
                text(&d.bl_number),
                text(&d.bl_amount),
                text(&d.invoice_reference),
                text(&d.invoice_amount),
                text(&difference(row)),
                text(&d.due_date),
                row.reconciliation_state.label().to_string(),
                d.validated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ])
            .map_err(fail)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv export failed: {}", e)))
}
