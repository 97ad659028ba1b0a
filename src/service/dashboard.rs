use bigdecimal::BigDecimal;
use chrono::{Datelike, Local, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::db::{customer_orders, deliveries, dlc, orders, publicities, suppliers, tasks};
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, CustomerOrder, CustomerOrderStatus, Delivery, DeliveryStatus, DlcProduct,
    DlcStatus, Order, OrderStatus, Publicity, Supplier, Task, TaskStatus,
};
use crate::service::permissions::StoreScope;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub store_id: Option<i64>,
    /// `YYYY-MM`, defaults to the current month
    pub month: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderCounts {
    pub pending: usize,
    pub planned: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub planned: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerOrderCounts {
    pub waiting: usize,
    pub arrived: usize,
    pub retrieved: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierTotal {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub deliveries: usize,
    pub bl_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub month: String,
    pub orders: OrderCounts,
    pub deliveries: DeliveryCounts,
    pub pending_reconciliations: usize,
    pub delivered_bl_total: BigDecimal,
    pub supplier_totals: Vec<SupplierTotal>,
    pub customer_orders: CustomerOrderCounts,
    pub active_publicities: usize,
    pub dlc_expiring: usize,
    pub dlc_expired: usize,
    pub open_tasks: usize,
}

/// Everything the dashboard reads, already scoped to the caller's stores
#[derive(Debug, Clone, Default)]
pub struct DashboardInputs {
    pub orders: Vec<Order>,
    pub deliveries: Vec<Delivery>,
    pub suppliers: Vec<Supplier>,
    pub customer_orders: Vec<CustomerOrder>,
    pub publicities: Vec<Publicity>,
    pub dlc_products: Vec<DlcProduct>,
    pub tasks: Vec<Task>,
}

/// First and last day of a `YYYY-MM` month
pub fn month_bounds(month: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::Validation(format!("invalid month '{}', expected YYYY-MM", month));
    let (year, month) = month.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((first, next.pred_opt().ok_or_else(invalid)?))
}

/// Aggregates the month. Orders and deliveries are expected to be those of the month.
pub fn compute_stats(
    inputs: &DashboardInputs,
    first: NaiveDate,
    last: NaiveDate,
    today: NaiveDate,
) -> DashboardStats {
    let orders = inputs
        .orders
        .par_iter()
        .fold(OrderCounts::default, |mut acc, o| {
            match o.status {
                OrderStatus::Pending => acc.pending += 1,
                OrderStatus::Planned => acc.planned += 1,
                OrderStatus::Delivered => acc.delivered += 1,
            }
            acc
        })
        .reduce(OrderCounts::default, |a, b| OrderCounts {
            pending: a.pending + b.pending,
            planned: a.planned + b.planned,
            delivered: a.delivered + b.delivered,
        });

    let automatic: HashMap<i64, bool> = inputs
        .suppliers
        .iter()
        .map(|s| (s.id, s.automatic_reconciliation))
        .collect();
    let names: HashMap<i64, &str> = inputs.suppliers.iter().map(|s| (s.id, s.name.as_str())).collect();

    let delivered: Vec<&Delivery> = inputs
        .deliveries
        .par_iter()
        .filter(|d| d.status == DeliveryStatus::Delivered)
        .collect();

    let deliveries = DeliveryCounts {
        planned: inputs.deliveries.len() - delivered.len(),
        delivered: delivered.len(),
    };

    let pending_reconciliations = delivered
        .par_iter()
        .filter(|d| !d.reconciled && !automatic.get(&d.supplier_id).copied().unwrap_or(false))
        .count();

    let per_supplier: HashMap<i64, (usize, BigDecimal)> = delivered
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<i64, (usize, BigDecimal)>, d| {
            let entry = acc.entry(d.supplier_id).or_insert_with(|| (0, BigDecimal::from(0)));
            entry.0 += 1;
            if let Some(amount) = &d.bl_amount {
                entry.1 += amount;
            }
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (id, (count, total)) in b {
                let entry = a.entry(id).or_insert_with(|| (0, BigDecimal::from(0)));
                entry.0 += count;
                entry.1 += total;
            }
            a
        });

    let mut supplier_totals: Vec<SupplierTotal> = per_supplier
        .into_iter()
        .map(|(supplier_id, (count, bl_total))| SupplierTotal {
            supplier_id,
            supplier_name: names.get(&supplier_id).unwrap_or(&"").to_string(),
            deliveries: count,
            bl_total,
        })
        .collect();
    supplier_totals.sort_by(|a, b| {
        b.bl_total
            .cmp(&a.bl_total)
            .then_with(|| a.supplier_name.cmp(&b.supplier_name))
    });

    let delivered_bl_total = supplier_totals
        .iter()
        .fold(BigDecimal::from(0), |acc, s| acc + &s.bl_total);

    let mut customer_orders = CustomerOrderCounts::default();
    for c in &inputs.customer_orders {
        match c.status {
            CustomerOrderStatus::Waiting => customer_orders.waiting += 1,
            CustomerOrderStatus::Arrived => customer_orders.arrived += 1,
            CustomerOrderStatus::Retrieved => customer_orders.retrieved += 1,
            CustomerOrderStatus::Cancelled => customer_orders.cancelled += 1,
        }
    }

    let dlc_statuses: Vec<DlcStatus> = inputs
        .dlc_products
        .par_iter()
        .map(|p| p.effective_status(today))
        .collect();

    DashboardStats {
        month: format!("{:04}-{:02}", first.year(), first.month()),
        orders,
        deliveries,
        pending_reconciliations,
        delivered_bl_total,
        supplier_totals,
        customer_orders,
        active_publicities: inputs
            .publicities
            .iter()
            .filter(|p| p.overlaps(first, last))
            .count(),
        dlc_expiring: dlc_statuses.iter().filter(|s| **s == DlcStatus::Expiring).count(),
        dlc_expired: dlc_statuses.iter().filter(|s| **s == DlcStatus::Expired).count(),
        open_tasks: inputs
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count(),
    }
}

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self, user: &CurrentUser, query: &DashboardQuery) -> AppResult<DashboardStats> {
        let scope = StoreScope::resolve(user, query.store_id)?;
        let ids = scope.as_filter();
        let ids = ids.as_deref();

        let today = Local::now().date_naive();
        let month = query
            .month
            .clone()
            .unwrap_or_else(|| format!("{:04}-{:02}", today.year(), today.month()));
        let (first, last) = month_bounds(&month)?;

        let inputs = DashboardInputs {
            orders: orders::list_orders(&self.pool, ids, Some(first), Some(last)).await?,
            deliveries: deliveries::deliveries_in_period(&self.pool, ids, first, last).await?,
            suppliers: suppliers::list_suppliers(&self.pool).await?,
            customer_orders: customer_orders::list_customer_orders(&self.pool, ids).await?,
            publicities: publicities::publicities_in_period(&self.pool, first, last, ids).await?,
            dlc_products: dlc::list_dlc_products(&self.pool, ids).await?,
            tasks: tasks::list_tasks(&self.pool, ids).await?,
        };

        let stats = tokio::task::spawn_blocking(move || compute_stats(&inputs, first, last, today))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        tracing::debug!(month = %stats.month, pending = stats.pending_reconciliations, "dashboard computed");
        Ok(stats)
    }
}
