//! Stores, ledger connections and suppliers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::handlers::Ack;
use crate::error::AppResult;
use crate::models::{
    CurrentUser, GroupInput, GroupView, NocodbConfigInput, NocodbConfigView, Supplier,
    SupplierInput,
};
use crate::state::AppState;

pub async fn list_groups(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<GroupView>>> {
    Ok(Json(state.stores.list_groups(&user).await?))
}

pub async fn create_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<GroupInput>,
) -> AppResult<(StatusCode, Json<GroupView>)> {
    Ok((StatusCode::CREATED, Json(state.stores.create_group(&user, input).await?)))
}

pub async fn update_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<GroupInput>,
) -> AppResult<Json<GroupView>> {
    Ok(Json(state.stores.update_group(&user, id, input).await?))
}

pub async fn list_nocodb_configs(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<NocodbConfigView>>> {
    Ok(Json(state.stores.list_configs(&user).await?))
}

pub async fn create_nocodb_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<NocodbConfigInput>,
) -> AppResult<(StatusCode, Json<NocodbConfigView>)> {
    Ok((StatusCode::CREATED, Json(state.stores.create_config(&user, input).await?)))
}

pub async fn update_nocodb_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<NocodbConfigInput>,
) -> AppResult<Json<NocodbConfigView>> {
    Ok(Json(state.stores.update_config(&user, id, input).await?))
}

pub async fn delete_nocodb_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.stores.delete_config(&user, id).await?;
    Ok(Ack::ok(format!("nocodb config {} deleted", id)))
}

/// Every authenticated user may read the supplier list
pub async fn list_suppliers(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    Ok(Json(state.suppliers.list().await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    Ok((StatusCode::CREATED, Json(state.suppliers.create(&user, input).await?)))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<SupplierInput>,
) -> AppResult<Json<Supplier>> {
    Ok(Json(state.suppliers.update(&user, id, input).await?))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.suppliers.delete(&user, id).await?;
    Ok(Ack::ok(format!("supplier {} deleted", id)))
}
