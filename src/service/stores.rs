use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;

use crate::db::{groups, nocodb};
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, Group, GroupInput, GroupView, NocodbConfig, NocodbConfigInput, NocodbConfigView,
};
use crate::service::permissions::{self, Action, Module, StoreScope};

/// Stores and the NocoDB instances their ledgers live in
pub struct StoreService {
    pool: PgPool,
}

impl StoreService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Admins get every store, others their assignments, each with its capabilities
    pub async fn list_groups(&self, user: &CurrentUser) -> AppResult<Vec<GroupView>> {
        let scope = StoreScope::resolve(user, None)?;
        let filter = scope.as_filter();
        let rows = groups::list_groups(&self.pool, filter.as_deref()).await?;
        let configs: HashMap<i64, NocodbConfig> = nocodb::list_configs(&self.pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        Ok(rows.into_iter().map(|g| view(g, &configs)).collect())
    }

    pub async fn create_group(&self, user: &CurrentUser, input: GroupInput) -> AppResult<GroupView> {
        permissions::require(user, Module::Groups, Action::Create)?;
        self.check_group_input(&input).await?;
        let group = groups::insert_group(&self.pool, &input).await?;
        info!(group_id = group.id, name = %group.name, "store created");
        self.group_view(group).await
    }

    pub async fn update_group(
        &self,
        user: &CurrentUser,
        id: i64,
        input: GroupInput,
    ) -> AppResult<GroupView> {
        permissions::require(user, Module::Groups, Action::Edit)?;
        self.check_group_input(&input).await?;
        let group = groups::update_group(&self.pool, id, &input)
            .await?
            .ok_or_else(|| AppError::not_found("store", id))?;
        info!(
            group_id = id,
            config_id = ?group.nocodb_config_id,
            "store updated"
        );
        self.group_view(group).await
    }

    pub async fn list_configs(&self, user: &CurrentUser) -> AppResult<Vec<NocodbConfigView>> {
        permissions::require_admin(user)?;
        Ok(nocodb::list_configs(&self.pool)
            .await?
            .into_iter()
            .map(NocodbConfigView::from)
            .collect())
    }

    pub async fn create_config(
        &self,
        user: &CurrentUser,
        input: NocodbConfigInput,
    ) -> AppResult<NocodbConfigView> {
        permissions::require_admin(user)?;
        check_config_input(&input)?;
        let config = nocodb::insert_config(&self.pool, &input).await?;
        info!(config_id = config.id, base_url = %config.base_url, "nocodb config created");
        Ok(config.into())
    }

    pub async fn update_config(
        &self,
        user: &CurrentUser,
        id: i64,
        input: NocodbConfigInput,
    ) -> AppResult<NocodbConfigView> {
        permissions::require_admin(user)?;
        check_config_input(&input)?;
        let config = nocodb::update_config(&self.pool, id, &input)
            .await?
            .ok_or_else(|| AppError::not_found("nocodb config", id))?;
        info!(config_id = id, "nocodb config updated");
        Ok(config.into())
    }

    pub async fn delete_config(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require_admin(user)?;
        if !nocodb::delete_config(&self.pool, id).await? {
            return Err(AppError::not_found("nocodb config", id));
        }
        info!(config_id = id, "nocodb config deleted");
        Ok(())
    }

    async fn group_view(&self, group: Group) -> AppResult<GroupView> {
        let mut configs = HashMap::new();
        if let Some(id) = group.nocodb_config_id {
            if let Some(config) = nocodb::get_config(&self.pool, id).await? {
                configs.insert(id, config);
            }
        }
        Ok(view(group, &configs))
    }

    async fn check_group_input(&self, input: &GroupInput) -> AppResult<()> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation("store name is required".to_string()));
        }
        if let Some(id) = input.nocodb_config_id {
            if nocodb::get_config(&self.pool, id).await?.is_none() {
                return Err(AppError::Validation(format!("unknown nocodb config {}", id)));
            }
        }
        Ok(())
    }
}

fn view(group: Group, configs: &HashMap<i64, NocodbConfig>) -> GroupView {
    let config = group.nocodb_config_id.and_then(|id| configs.get(&id));
    let capabilities = group.capabilities(config);
    GroupView {
        group,
        capabilities,
    }
}

fn check_config_input(input: &NocodbConfigInput) -> AppResult<()> {
    let url = input.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::Validation(
            "baseUrl must start with http:// or https://".to_string(),
        ));
    }
    if input.project_id.trim().is_empty() {
        return Err(AppError::Validation("projectId is required".to_string()));
    }
    Ok(())
}
