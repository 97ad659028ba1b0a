use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::handlers::Ack;
use crate::error::AppResult;
use crate::models::{CurrentUser, DlcFilter, DlcProduct, DlcProductInput, DlcProductUpdate, DlcStats};
use crate::service::permissions::StoreQuery;
use crate::state::AppState;

pub async fn list_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<DlcFilter>,
) -> AppResult<Json<Vec<DlcProduct>>> {
    Ok(Json(state.dlc.list(&user, &filter).await?))
}

pub async fn product_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<Json<DlcStats>> {
    Ok(Json(state.dlc.stats(&user, query.store_id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<DlcProductInput>,
) -> AppResult<(StatusCode, Json<DlcProduct>)> {
    Ok((StatusCode::CREATED, Json(state.dlc.create(&user, input).await?)))
}

pub async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<DlcProductUpdate>,
) -> AppResult<Json<DlcProduct>> {
    Ok(Json(state.dlc.update(&user, id, update).await?))
}

pub async fn validate_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DlcProduct>> {
    Ok(Json(state.dlc.validate(&user, id).await?))
}

pub async fn mark_stock_epuise(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DlcProduct>> {
    Ok(Json(state.dlc.mark_stock_epuise(&user, id).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.dlc.delete(&user, id).await?;
    Ok(Ack::ok(format!("dlc product {} deleted", id)))
}
