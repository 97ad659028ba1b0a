use crate::models::{CurrentUser, User};
use sqlx::PgPool;

/// Loads a user with the store ids assigned to them
pub async fn find_current_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<CurrentUser>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, name, email, role, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let group_ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT group_id FROM user_groups
        WHERE user_id = $1
        ORDER BY group_id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(CurrentUser { user, group_ids }))
}
