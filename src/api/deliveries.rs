use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::handlers::Ack;
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, DeliveryFilter, DeliveryInput, DeliveryUpdate, DeliveryWithRelations,
    VerificationOutcome, VerifyInvoiceRequest,
};
use crate::service::webhook::{InvoicePdf, InvoiceUploadResult};
use crate::state::AppState;

pub async fn list_deliveries(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<DeliveryFilter>,
) -> AppResult<Json<Vec<DeliveryWithRelations>>> {
    Ok(Json(state.deliveries.list(&user, &filter).await?))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeliveryWithRelations>> {
    Ok(Json(state.deliveries.get(&user, id).await?))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<DeliveryInput>,
) -> AppResult<(StatusCode, Json<DeliveryWithRelations>)> {
    let delivery = state.deliveries.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn update_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<DeliveryUpdate>,
) -> AppResult<Json<DeliveryWithRelations>> {
    Ok(Json(state.deliveries.update(&user, id, update).await?))
}

pub async fn delete_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.deliveries.delete(&user, id).await?;
    Ok(Ack::ok(format!("delivery {} deleted", id)))
}

/// Ledger failures still produce an outcome body so the client always gets a result
pub fn outcome_or_lookup_failure(
    result: AppResult<VerificationOutcome>,
) -> AppResult<VerificationOutcome> {
    match result {
        Err(AppError::ExternalLookup(message)) => Ok(VerificationOutcome::lookup_failed(message)),
        other => other,
    }
}

pub async fn verify_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<VerifyInvoiceRequest>,
) -> AppResult<Json<VerificationOutcome>> {
    let result = state.reconciliation.verify(&user, id, &request).await;
    Ok(Json(outcome_or_lookup_failure(result)?))
}

pub async fn validate_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeliveryWithRelations>> {
    Ok(Json(state.reconciliation.validate(&user, id).await?))
}

pub async fn devalidate_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeliveryWithRelations>> {
    Ok(Json(state.reconciliation.devalidate(&user, id).await?))
}

pub async fn upload_invoice_pdf(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<InvoiceUploadResult>> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("invalid multipart body: {}", e))
    };

    let mut pdf = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("invoice.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(bad_form)?;
        pdf = Some(InvoicePdf {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let pdf = pdf.ok_or_else(|| AppError::Validation("missing 'file' part".to_string()))?;
    Ok(Json(state.uploader.upload(&user, id, pdf).await?))
}
