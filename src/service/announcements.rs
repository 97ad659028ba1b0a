use sqlx::PgPool;
use tracing::info;

use crate::db::{customer_orders, publicities};
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, CustomerOrder, CustomerOrderInput, Publicity, PublicityInput, Role,
};
use crate::service::permissions::{self, Action, Module, StoreScope};

/// Publicities and customer orders, carried as far as the dashboard and calendar need
pub struct AnnouncementService {
    pool: PgPool,
}

impl AnnouncementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_publicities(
        &self,
        user: &CurrentUser,
        year: Option<i32>,
    ) -> AppResult<Vec<Publicity>> {
        permissions::require(user, Module::Publicities, Action::View)?;
        let scope = StoreScope::resolve(user, None)?;
        let ids = scope.as_filter();
        Ok(publicities::list_publicities(&self.pool, year, ids.as_deref()).await?)
    }

    pub async fn create_publicity(
        &self,
        user: &CurrentUser,
        input: PublicityInput,
    ) -> AppResult<Publicity> {
        if !matches!(user.role(), Role::Admin | Role::Directeur) {
            return Err(AppError::PermissionDenied(
                "only administrators and directors manage publicities".to_string(),
            ));
        }
        if input.end_date < input.start_date {
            return Err(AppError::Validation(
                "publicity end date is before its start date".to_string(),
            ));
        }
        for group_id in &input.group_ids {
            permissions::require_group(user, *group_id)?;
        }
        let publicity = publicities::insert_publicity(&self.pool, &input, user.id()).await?;
        info!(publicity_id = publicity.id, pub_number = %publicity.pub_number, "publicity created");
        Ok(publicity)
    }

    pub async fn list_customer_orders(
        &self,
        user: &CurrentUser,
        store_id: Option<i64>,
    ) -> AppResult<Vec<CustomerOrder>> {
        permissions::require(user, Module::CustomerOrders, Action::View)?;
        let scope = StoreScope::resolve(user, store_id)?;
        let ids = scope.as_filter();
        Ok(customer_orders::list_customer_orders(&self.pool, ids.as_deref()).await?)
    }

    pub async fn create_customer_order(
        &self,
        user: &CurrentUser,
        input: CustomerOrderInput,
    ) -> AppResult<CustomerOrder> {
        permissions::require(user, Module::CustomerOrders, Action::Create)?;
        permissions::require_group(user, input.group_id)?;
        if input.customer_name.trim().is_empty() || input.product_designation.trim().is_empty() {
            return Err(AppError::Validation(
                "customer name and product designation are required".to_string(),
            ));
        }
        if input.quantity.is_some_and(|q| q <= 0) {
            return Err(AppError::Validation("quantity must be positive".to_string()));
        }
        let order = customer_orders::insert_customer_order(&self.pool, &input, user.id()).await?;
        info!(customer_order_id = order.id, group_id = order.group_id, "customer order created");
        Ok(order)
    }
}
