use crate::models::{Publicity, PublicityInput};
use chrono::Datelike;
use sqlx::PgPool;

const PUBLICITY_SELECT: &str = r#"
    SELECT p.id, p.pub_number, p.designation, p.start_date, p.end_date, p.year,
           COALESCE(array_agg(pp.group_id ORDER BY pp.group_id)
                    FILTER (WHERE pp.group_id IS NOT NULL), '{}') AS group_ids,
           p.created_by, p.created_at
    FROM publicities p
    LEFT JOIN publicity_participations pp ON pp.publicity_id = p.id
"#;

/// Publicities of a year; with `group_ids`, only those the stores take part in
pub async fn list_publicities(
    pool: &PgPool,
    year: Option<i32>,
    group_ids: Option<&[i64]>,
) -> Result<Vec<Publicity>, sqlx::Error> {
    sqlx::query_as::<_, Publicity>(&format!(
        r#"
        {}
        WHERE ($1::int IS NULL OR p.year = $1)
          AND ($2::bigint[] IS NULL OR EXISTS (
              SELECT 1 FROM publicity_participations x
              WHERE x.publicity_id = p.id AND x.group_id = ANY($2)
          ))
        GROUP BY p.id
        ORDER BY p.start_date, p.id
        "#,
        PUBLICITY_SELECT
    ))
    .bind(year)
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

/// Publicities running at some point within `[from, to]`
pub async fn publicities_in_period(
    pool: &PgPool,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
    group_ids: Option<&[i64]>,
) -> Result<Vec<Publicity>, sqlx::Error> {
    sqlx::query_as::<_, Publicity>(&format!(
        r#"
        {}
        WHERE p.start_date <= $2 AND p.end_date >= $1
          AND ($3::bigint[] IS NULL OR EXISTS (
              SELECT 1 FROM publicity_participations x
              WHERE x.publicity_id = p.id AND x.group_id = ANY($3)
          ))
        GROUP BY p.id
        ORDER BY p.start_date, p.id
        "#,
        PUBLICITY_SELECT
    ))
    .bind(from)
    .bind(to)
    .bind(group_ids)
    .fetch_all(pool)
    .await
}

/// Inserts the publicity and its participations in one transaction
pub async fn insert_publicity(
    pool: &PgPool,
    input: &PublicityInput,
    created_by: i64,
) -> Result<Publicity, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO publicities (pub_number, designation, start_date, end_date, year, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&input.pub_number)
    .bind(&input.designation)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.start_date.year())
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await?;

    if !input.group_ids.is_empty() {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO publicity_participations (publicity_id, group_id) ",
        );
        builder.push_values(&input.group_ids, |mut b, group_id| {
            b.push_bind(id).push_bind(*group_id);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        builder.build().execute(&mut *tx).await?;
    }

    let publicity = sqlx::query_as::<_, Publicity>(&format!(
        "{} WHERE p.id = $1 GROUP BY p.id",
        PUBLICITY_SELECT
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(publicity)
}
