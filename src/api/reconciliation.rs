use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::error::AppResult;
use crate::models::{CurrentUser, DeliveryWithRelations};
use crate::service::export;
use crate::service::permissions::StoreQuery;
use crate::service::reconciliation::BulkVerificationReport;
use crate::state::AppState;

pub async fn list_reconciliation(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<Json<Vec<DeliveryWithRelations>>> {
    Ok(Json(state.reconciliation.list(&user, query.store_id).await?))
}

pub async fn verify_all(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<Json<BulkVerificationReport>> {
    Ok(Json(state.reconciliation.bulk_verify(&user, query.store_id).await?))
}

pub async fn export_reconciliation(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<impl IntoResponse> {
    let rows = state.reconciliation.list(&user, query.store_id).await?;
    let body = export::reconciliation_csv(&rows)?;
    tracing::info!(rows = rows.len(), user_id = user.id(), "reconciliation exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"reconciliation.csv\"",
            ),
        ],
        body,
    ))
}
