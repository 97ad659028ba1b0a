use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use crate::db::{orders, suppliers};
use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, Order, OrderFilter, OrderInput, OrderStatus, OrderUpdate};
use crate::service::permissions::{self, Action, Module, StoreScope};

pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user: &CurrentUser, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        permissions::require(user, Module::Orders, Action::View)?;
        let scope = StoreScope::resolve(user, filter.store_id)?;
        let ids = scope.as_filter();
        Ok(orders::list_orders(&self.pool, ids.as_deref(), filter.start_date, filter.end_date).await?)
    }

    pub async fn get(&self, user: &CurrentUser, id: i64) -> AppResult<Order> {
        permissions::require(user, Module::Orders, Action::View)?;
        let order = orders::get_order(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("order", id))?;
        permissions::require_group(user, order.group_id)?;
        Ok(order)
    }

    pub async fn create(&self, user: &CurrentUser, input: OrderInput) -> AppResult<Order> {
        permissions::require(user, Module::Orders, Action::Create)?;
        permissions::require_group(user, input.group_id)?;
        self.check_supplier(input.supplier_id).await?;

        let order = Order {
            id: 0,
            supplier_id: input.supplier_id,
            group_id: input.group_id,
            planned_date: input.planned_date,
            quantity: input.quantity,
            unit: input.unit,
            status: input.status.unwrap_or(OrderStatus::Pending),
            notes: input.notes,
            created_by: user.id(),
            created_at: Utc::now(),
        };
        let saved = orders::insert_order(&self.pool, &order).await?;
        info!(order_id = saved.id, group_id = saved.group_id, "order created");
        Ok(saved)
    }

    pub async fn update(&self, user: &CurrentUser, id: i64, update: OrderUpdate) -> AppResult<Order> {
        permissions::require(user, Module::Orders, Action::Edit)?;
        let existing = self.get(user, id).await?;
        let merged = existing.merged_with(&update);
        if merged.supplier_id != existing.supplier_id {
            self.check_supplier(merged.supplier_id).await?;
        }
        let saved = orders::update_order(&self.pool, &merged)
            .await?
            .ok_or_else(|| AppError::not_found("order", id))?;
        info!(order_id = id, status = ?saved.status, "order updated");
        Ok(saved)
    }

    pub async fn delete(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require(user, Module::Orders, Action::Delete)?;
        self.get(user, id).await?;
        orders::delete_order(&self.pool, id).await?;
        info!(order_id = id, "order deleted");
        Ok(())
    }

    async fn check_supplier(&self, supplier_id: i64) -> AppResult<()> {
        suppliers::get_supplier(&self.pool, supplier_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::Validation(format!("unknown supplier {}", supplier_id)))
    }
}
