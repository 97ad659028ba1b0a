use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::db::tasks;
use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, Task, TaskInput, TaskPriority, TaskStatus, TaskUpdate};
use crate::service::permissions::{self, Action, Module, StoreScope, StoreQuery};

/// Due date may not precede the start date
pub fn check_dates(start: Option<NaiveDate>, due: Option<NaiveDate>) -> AppResult<()> {
    match (start, due) {
        (Some(start), Some(due)) if due < start => Err(AppError::Validation(format!(
            "due date {} is before start date {}",
            due, start
        ))),
        _ => Ok(()),
    }
}

/// Applies an update; reopening a task clears its completion
pub fn merge(existing: &Task, update: TaskUpdate) -> AppResult<Task> {
    let mut merged = Task {
        title: update.title.unwrap_or_else(|| existing.title.clone()),
        description: update.description.or_else(|| existing.description.clone()),
        priority: update.priority.unwrap_or(existing.priority),
        status: update.status.unwrap_or(existing.status),
        assigned_to: update.assigned_to.unwrap_or_else(|| existing.assigned_to.clone()),
        start_date: update.start_date.or(existing.start_date),
        due_date: update.due_date.or(existing.due_date),
        ..existing.clone()
    };
    if merged.title.trim().is_empty() {
        return Err(AppError::Validation("task title is required".to_string()));
    }
    check_dates(merged.start_date, merged.due_date)?;
    if merged.status == TaskStatus::Pending {
        merged.completed_at = None;
        merged.completed_by = None;
    }
    Ok(merged)
}

pub struct TaskService {
    pool: PgPool,
}

impl TaskService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user: &CurrentUser, query: &StoreQuery) -> AppResult<Vec<Task>> {
        permissions::require(user, Module::Tasks, Action::View)?;
        let scope = StoreScope::resolve(user, query.store_id)?;
        let ids = scope.as_filter();
        Ok(tasks::list_tasks(&self.pool, ids.as_deref()).await?)
    }

    pub async fn create(&self, user: &CurrentUser, input: TaskInput) -> AppResult<Task> {
        permissions::require(user, Module::Tasks, Action::Create)?;
        permissions::require_group(user, input.group_id)?;
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("task title is required".to_string()));
        }
        check_dates(input.start_date, input.due_date)?;

        let task = Task {
            id: 0,
            group_id: input.group_id,
            title: input.title.trim().to_string(),
            description: input.description,
            priority: input.priority.unwrap_or(TaskPriority::Medium),
            status: TaskStatus::Pending,
            assigned_to: input.assigned_to,
            start_date: input.start_date,
            due_date: input.due_date,
            completed_at: None,
            completed_by: None,
            created_by: user.id(),
            created_at: Utc::now(),
        };
        let saved = tasks::insert_task(&self.pool, &task).await?;
        info!(task_id = saved.id, group_id = saved.group_id, "task created");
        Ok(saved)
    }

    pub async fn update(&self, user: &CurrentUser, id: i64, update: TaskUpdate) -> AppResult<Task> {
        permissions::require(user, Module::Tasks, Action::Edit)?;
        let existing = self.load(user, id).await?;
        let mut merged = merge(&existing, update)?;
        if merged.status == TaskStatus::Completed && merged.completed_at.is_none() {
            merged.completed_at = Some(Utc::now());
            merged.completed_by = Some(user.id());
        }
        tasks::update_task(&self.pool, &merged)
            .await?
            .ok_or_else(|| AppError::not_found("task", id))
    }

    pub async fn complete(&self, user: &CurrentUser, id: i64) -> AppResult<Task> {
        permissions::require_any(user, Module::Tasks, &[Action::Edit, Action::Validate])?;
        self.load(user, id).await?;
        let saved = tasks::complete_task(&self.pool, id, user.id(), Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("task", id))?;
        info!(task_id = id, user_id = user.id(), "task completed");
        Ok(saved)
    }

    pub async fn delete(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require(user, Module::Tasks, Action::Delete)?;
        self.load(user, id).await?;
        tasks::delete_task(&self.pool, id).await?;
        info!(task_id = id, "task deleted");
        Ok(())
    }

    async fn load(&self, user: &CurrentUser, id: i64) -> AppResult<Task> {
        let task = tasks::get_task(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("task", id))?;
        permissions::require_group(user, task.group_id)?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn task() -> Task {
        Task {
            id: 1,
            group_id: 1,
            title: "Inventaire rayon frais".into(),
            description: None,
            priority: TaskPriority::High,
            status: TaskStatus::Completed,
            assigned_to: "Equipe matin".into(),
            start_date: Some(d(10)),
            due_date: Some(d(12)),
            completed_at: Some(Utc::now()),
            completed_by: Some(3),
            created_by: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn due_date_cannot_precede_start() {
        assert!(check_dates(Some(d(10)), Some(d(10))).is_ok());
        assert!(check_dates(None, Some(d(1))).is_ok());
        assert!(matches!(
            check_dates(Some(d(10)), Some(d(9))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn update_is_checked_against_stored_dates() {
        let err = merge(
            &task(),
            TaskUpdate {
                due_date: Some(d(8)),
                ..Default::default()
            },
        );
        assert!(err.is_err());

        let moved = merge(
            &task(),
            TaskUpdate {
                start_date: Some(d(1)),
                due_date: Some(d(8)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(moved.due_date, Some(d(8)));
    }

    #[test]
    fn reopening_clears_completion() {
        let reopened = merge(
            &task(),
            TaskUpdate {
                status: Some(TaskStatus::Pending),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(reopened.completed_at.is_none());
        assert!(reopened.completed_by.is_none());
    }
}
