//! Publicities and customer orders.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{CurrentUser, CustomerOrder, CustomerOrderInput, Publicity, PublicityInput};
use crate::service::permissions::StoreQuery;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

pub async fn list_publicities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<YearQuery>,
) -> AppResult<Json<Vec<Publicity>>> {
    Ok(Json(state.announcements.list_publicities(&user, query.year).await?))
}

pub async fn create_publicity(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<PublicityInput>,
) -> AppResult<(StatusCode, Json<Publicity>)> {
    let publicity = state.announcements.create_publicity(&user, input).await?;
    Ok((StatusCode::CREATED, Json(publicity)))
}

pub async fn list_customer_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<Json<Vec<CustomerOrder>>> {
    Ok(Json(
        state
            .announcements
            .list_customer_orders(&user, query.store_id)
            .await?,
    ))
}

pub async fn create_customer_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CustomerOrderInput>,
) -> AppResult<(StatusCode, Json<CustomerOrder>)> {
    let order = state.announcements.create_customer_order(&user, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
