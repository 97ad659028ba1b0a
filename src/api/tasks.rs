use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::handlers::Ack;
use crate::error::AppResult;
use crate::models::{CurrentUser, Task, TaskInput, TaskUpdate};
use crate::service::permissions::StoreQuery;
use crate::state::AppState;

pub async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StoreQuery>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list(&user, &query).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<TaskInput>,
) -> AppResult<(StatusCode, Json<Task>)> {
    Ok((StatusCode::CREATED, Json(state.tasks.create(&user, input).await?)))
}

pub async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.update(&user, id, update).await?))
}

pub async fn complete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.complete(&user, id).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Ack>> {
    state.tasks.delete(&user, id).await?;
    Ok(Ack::ok(format!("task {} deleted", id)))
}
