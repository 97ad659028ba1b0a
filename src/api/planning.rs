//! Orders, dashboard and calendar.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::handlers::Ack;
use crate::error::AppResult;
use crate::models::{CurrentUser, Order, OrderFilter, OrderInput, OrderUpdate};
use crate::service::calendar::{CalendarMonth, CalendarQuery};
use crate::service::dashboard::{DashboardQuery, DashboardStats};
use crate::state::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list(&user, &filter).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get(&user, id).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<OrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    Ok((StatusCode::CREATED, Json(state.orders.create(&user, input).await?)))
}

pub async fn update_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<OrderUpdate>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.update(&user, id, update).await?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.orders.delete(&user, id).await?;
    Ok(Ack::ok(format!("order {} deleted", id)))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.stats(&user, &query).await?))
}

pub async fn calendar_month(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Json<CalendarMonth>> {
    Ok(Json(state.calendar.month(&user, &query).await?))
}
