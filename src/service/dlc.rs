use chrono::{Local, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::db::{dlc, suppliers};
use crate::error::{AppError, AppResult};
use crate::models::{
    clean, CurrentUser, DateType, DlcFilter, DlcProduct, DlcProductInput, DlcProductUpdate,
    DlcStats, DlcStatus,
};
use crate::service::permissions::{self, Action, Module, StoreScope};

/// Counts by derived status; exhausted stock is counted on top
pub fn compute_stats(products: &[DlcProduct], today: NaiveDate) -> DlcStats {
    products.iter().fold(DlcStats::default(), |mut stats, p| {
        match p.effective_status(today) {
            DlcStatus::Active => stats.active += 1,
            DlcStatus::Expiring => stats.expiring += 1,
            DlcStatus::Expired => stats.expired += 1,
            DlcStatus::Validated => stats.validated += 1,
        }
        if p.stock_epuise {
            stats.stock_epuise += 1;
        }
        stats
    })
}

fn merge(existing: &DlcProduct, update: DlcProductUpdate) -> AppResult<DlcProduct> {
    let merged = DlcProduct {
        product_name: update.product_name.unwrap_or_else(|| existing.product_name.clone()),
        gencode: match update.gencode {
            Some(g) => clean(Some(&g)),
            None => existing.gencode.clone(),
        },
        dlc_date: update.dlc_date.unwrap_or(existing.dlc_date),
        date_type: update.date_type.unwrap_or(existing.date_type),
        quantity: update.quantity.unwrap_or(existing.quantity),
        unit: update.unit.or_else(|| existing.unit.clone()),
        location: update.location.or_else(|| existing.location.clone()),
        alert_threshold: update.alert_threshold.unwrap_or(existing.alert_threshold),
        ..existing.clone()
    };
    check(&merged.product_name, merged.quantity, merged.alert_threshold)?;
    Ok(merged)
}

fn check(product_name: &str, quantity: i32, alert_threshold: i32) -> AppResult<()> {
    if product_name.trim().is_empty() {
        return Err(AppError::Validation("product name is required".to_string()));
    }
    if quantity < 0 || alert_threshold < 0 {
        return Err(AppError::Validation(
            "quantity and alert threshold cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Expiry-date tracking
pub struct DlcService {
    pool: PgPool,
    default_alert_threshold: i32,
}

impl DlcService {
    pub fn new(pool: PgPool, default_alert_threshold: i32) -> Self {
        Self {
            pool,
            default_alert_threshold,
        }
    }

    async fn scoped(&self, user: &CurrentUser, store_id: Option<i64>) -> AppResult<Vec<DlcProduct>> {
        permissions::require(user, Module::Dlc, Action::View)?;
        let scope = StoreScope::resolve(user, store_id)?;
        let ids = scope.as_filter();
        let today = Local::now().date_naive();
        Ok(dlc::list_dlc_products(&self.pool, ids.as_deref())
            .await?
            .into_iter()
            .map(|p| p.with_effective_status(today))
            .collect())
    }

    pub async fn list(&self, user: &CurrentUser, filter: &DlcFilter) -> AppResult<Vec<DlcProduct>> {
        let products = self.scoped(user, filter.store_id).await?;
        Ok(match filter.status {
            Some(status) => products.into_iter().filter(|p| p.status == status).collect(),
            None => products,
        })
    }

    pub async fn stats(&self, user: &CurrentUser, store_id: Option<i64>) -> AppResult<DlcStats> {
        let products = self.scoped(user, store_id).await?;
        Ok(compute_stats(&products, Local::now().date_naive()))
    }

    pub async fn create(&self, user: &CurrentUser, input: DlcProductInput) -> AppResult<DlcProduct> {
        permissions::require(user, Module::Dlc, Action::Create)?;
        permissions::require_group(user, input.group_id)?;

        let supplier = suppliers::get_supplier(&self.pool, input.supplier_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("unknown supplier {}", input.supplier_id)))?;
        if !supplier.has_dlc {
            return Err(AppError::Validation(format!(
                "supplier {} does not take part in DLC tracking",
                supplier.name
            )));
        }

        let product = DlcProduct {
            id: 0,
            group_id: input.group_id,
            supplier_id: input.supplier_id,
            product_name: input.product_name.trim().to_string(),
            gencode: clean(input.gencode.as_deref()),
            dlc_date: input.dlc_date,
            date_type: input.date_type.unwrap_or(DateType::Dlc),
            quantity: input.quantity.unwrap_or(1),
            unit: input.unit,
            location: input.location,
            alert_threshold: input.alert_threshold.unwrap_or(self.default_alert_threshold),
            status: DlcStatus::Active,
            stock_epuise: false,
            validated_at: None,
            validated_by: None,
            created_by: user.id(),
            created_at: Utc::now(),
        };
        check(&product.product_name, product.quantity, product.alert_threshold)?;

        let saved = dlc::insert_dlc_product(&self.pool, &product).await?;
        info!(product_id = saved.id, dlc_date = %saved.dlc_date, "dlc product created");
        Ok(saved.with_effective_status(Local::now().date_naive()))
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        id: i64,
        update: DlcProductUpdate,
    ) -> AppResult<DlcProduct> {
        permissions::require(user, Module::Dlc, Action::Edit)?;
        let existing = self.load(user, id).await?;
        let merged = merge(&existing, update)?;
        let saved = dlc::update_dlc_product(&self.pool, &merged)
            .await?
            .ok_or_else(|| AppError::not_found("dlc product", id))?;
        Ok(saved.with_effective_status(Local::now().date_naive()))
    }

    pub async fn validate(&self, user: &CurrentUser, id: i64) -> AppResult<DlcProduct> {
        permissions::require(user, Module::Dlc, Action::Validate)?;
        self.load(user, id).await?;
        let saved = dlc::validate_dlc_product(&self.pool, id, user.id(), Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("dlc product", id))?;
        info!(product_id = id, user_id = user.id(), "dlc product validated");
        Ok(saved)
    }

    /// Flags the product as out of stock
    pub async fn mark_stock_epuise(&self, user: &CurrentUser, id: i64) -> AppResult<DlcProduct> {
        permissions::require(user, Module::Dlc, Action::Edit)?;
        self.load(user, id).await?;
        let saved = dlc::set_stock_epuise(&self.pool, id, true)
            .await?
            .ok_or_else(|| AppError::not_found("dlc product", id))?;
        info!(product_id = id, "dlc product out of stock");
        Ok(saved.with_effective_status(Local::now().date_naive()))
    }

    pub async fn delete(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require(user, Module::Dlc, Action::Delete)?;
        self.load(user, id).await?;
        dlc::delete_dlc_product(&self.pool, id).await?;
        info!(product_id = id, "dlc product deleted");
        Ok(())
    }

    async fn load(&self, user: &CurrentUser, id: i64) -> AppResult<DlcProduct> {
        let product = dlc::get_dlc_product(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("dlc product", id))?;
        permissions::require_group(user, product.group_id)?;
        Ok(product)
    }
}
