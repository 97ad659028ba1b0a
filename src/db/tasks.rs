use crate::models::Task;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const TASK_COLUMNS: &str = "id, group_id, title, description, priority, status, assigned_to, \
     start_date, due_date, completed_at, completed_by, created_by, created_at";

pub async fn list_tasks(pool: &PgPool, group_ids: Option<&[i64]>) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        r#"
        SELECT {}
        FROM tasks
        WHERE ($1::bigint[] IS NULL OR group_id = ANY($1))
        ORDER BY status, due_date NULLS LAST, id
        "#,
        TASK_COLUMNS
    ))
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

pub async fn get_task(pool: &PgPool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_task(pool: &PgPool, t: &Task) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        r#"
        INSERT INTO tasks (group_id, title, description, priority, assigned_to, start_date, due_date, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        TASK_COLUMNS
    ))
    .bind(t.group_id)
    .bind(&t.title)
    .bind(&t.description)
    .bind(t.priority)
    .bind(&t.assigned_to)
    .bind(t.start_date)
    .bind(t.due_date)
    .bind(t.created_by)
    .fetch_one(pool)
    .await
}

pub async fn update_task(pool: &PgPool, t: &Task) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
        SET title = $2, description = $3, priority = $4, status = $5, assigned_to = $6,
            start_date = $7, due_date = $8, completed_at = $9, completed_by = $10
        WHERE id = $1
        RETURNING {}
        "#,
        TASK_COLUMNS
    ))
    .bind(t.id)
    .bind(&t.title)
    .bind(&t.description)
    .bind(t.priority)
    .bind(t.status)
    .bind(&t.assigned_to)
    .bind(t.start_date)
    .bind(t.due_date)
    .bind(t.completed_at)
    .bind(t.completed_by)
    .fetch_optional(pool)
    .await
}

pub async fn complete_task(
    pool: &PgPool,
    id: i64,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
        SET status = 'completed', completed_at = $3, completed_by = $2
        WHERE id = $1
        RETURNING {}
        "#,
        TASK_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .bind(at)
    .fetch_optional(pool)
    .await
}

pub async fn delete_task(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
