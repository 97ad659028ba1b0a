use sqlx::PgPool;
use tracing::info;

use crate::db::suppliers;
use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, Supplier, SupplierInput};
use crate::service::permissions::{self, Action, Module};

pub struct SupplierService {
    pool: PgPool,
}

impl SupplierService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open to every authenticated user
    pub async fn list(&self) -> AppResult<Vec<Supplier>> {
        Ok(suppliers::list_suppliers(&self.pool).await?)
    }

    pub async fn create(&self, user: &CurrentUser, input: SupplierInput) -> AppResult<Supplier> {
        permissions::require(user, Module::Suppliers, Action::Create)?;
        validate(&input)?;
        let supplier = suppliers::insert_supplier(&self.pool, &input).await?;
        info!(supplier_id = supplier.id, name = %supplier.name, "supplier created");
        Ok(supplier)
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        id: i64,
        input: SupplierInput,
    ) -> AppResult<Supplier> {
        permissions::require(user, Module::Suppliers, Action::Edit)?;
        validate(&input)?;
        let supplier = suppliers::update_supplier(&self.pool, id, &input)
            .await?
            .ok_or_else(|| AppError::not_found("supplier", id))?;
        info!(supplier_id = id, "supplier updated");
        Ok(supplier)
    }

    pub async fn delete(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require(user, Module::Suppliers, Action::Delete)?;
        if !suppliers::delete_supplier(&self.pool, id).await? {
            return Err(AppError::not_found("supplier", id));
        }
        info!(supplier_id = id, "supplier deleted");
        Ok(())
    }
}

fn validate(input: &SupplierInput) -> AppResult<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("supplier name is required".to_string()));
    }
    Ok(())
}
