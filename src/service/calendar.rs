use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};

use crate::db::{deliveries, orders, publicities, suppliers};
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, Delivery, DeliveryStatus, Order, OrderStatus, Publicity, Supplier,
};
use crate::service::permissions::StoreScope;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
    pub store_id: Option<i64>,
}

/// One item shown in a calendar cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalendarEntry {
    #[serde(rename_all = "camelCase")]
    Order {
        id: i64,
        group_id: i64,
        supplier_name: String,
        status: OrderStatus,
    },
    #[serde(rename_all = "camelCase")]
    Delivery {
        id: i64,
        group_id: i64,
        supplier_name: String,
        status: DeliveryStatus,
        reconciled: bool,
    },
    #[serde(rename_all = "camelCase")]
    Publicity {
        id: i64,
        pub_number: String,
        designation: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub entries: Vec<CalendarEntry>,
    pub hidden_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Vec<CalendarDay>>,
}

/// Monday before (or on) the 1st to the Sunday after (or on) the last day
pub fn grid_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::Validation(format!("invalid month {}-{}", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        year.checked_add(1).and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;

    let lead = Duration::days(first.weekday().num_days_from_monday() as i64);
    let trail = Duration::days(6 - last.weekday().num_days_from_monday() as i64);
    let start = first.checked_sub_signed(lead).ok_or_else(invalid)?;
    let end = last.checked_add_signed(trail).ok_or_else(invalid)?;
    Ok((start, end))
}

/// Input of [`build_month`], scoped to the caller and the grid range
pub struct CalendarSources<'a> {
    pub orders: &'a [Order],
    pub deliveries: &'a [Delivery],
    pub publicities: &'a [Publicity],
    pub suppliers: &'a [Supplier],
    /// Orders already represented by a delivered delivery
    pub delivered_orders: &'a HashSet<i64>,
}

pub fn build_month(
    year: i32,
    month: u32,
    today: NaiveDate,
    max_visible: usize,
    sources: &CalendarSources<'_>,
) -> AppResult<CalendarMonth> {
    let (start, end) = grid_bounds(year, month)?;
    let supplier_name = |id: i64| {
        sources
            .suppliers
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    };

    let mut buckets: BTreeMap<NaiveDate, Vec<CalendarEntry>> = BTreeMap::new();

    for p in sources.publicities {
        let mut day = p.start_date.max(start);
        while day <= p.end_date.min(end) {
            buckets.entry(day).or_default().push(CalendarEntry::Publicity {
                id: p.id,
                pub_number: p.pub_number.clone(),
                designation: p.designation.clone(),
            });
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    for o in sources.orders {
        if sources.delivered_orders.contains(&o.id) || o.planned_date < start || o.planned_date > end {
            continue;
        }
        buckets.entry(o.planned_date).or_default().push(CalendarEntry::Order {
            id: o.id,
            group_id: o.group_id,
            supplier_name: supplier_name(o.supplier_id),
            status: o.status,
        });
    }

    for d in sources.deliveries {
        let date = d.effective_date();
        if date < start || date > end {
            continue;
        }
        buckets.entry(date).or_default().push(CalendarEntry::Delivery {
            id: d.id,
            group_id: d.group_id,
            supplier_name: supplier_name(d.supplier_id),
            status: d.status,
            reconciled: d.reconciled,
        });
    }

    let mut weeks = Vec::new();
    let mut week = Vec::with_capacity(7);
    let mut day = start;
    while day <= end {
        let mut entries = buckets.remove(&day).unwrap_or_default();
        let hidden_count = entries.len().saturating_sub(max_visible);
        entries.truncate(max_visible);
        week.push(CalendarDay {
            date: day,
            in_month: day.month() == month,
            is_today: day == today,
            entries,
            hidden_count,
        });
        if day.weekday() == Weekday::Sun {
            weeks.push(std::mem::take(&mut week));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    Ok(CalendarMonth { year, month, weeks })
}

pub struct CalendarService {
    pool: PgPool,
    max_visible_per_day: usize,
}

impl CalendarService {
    pub fn new(pool: PgPool, max_visible_per_day: usize) -> Self {
        Self {
            pool,
            max_visible_per_day,
        }
    }

    pub async fn month(&self, user: &CurrentUser, query: &CalendarQuery) -> AppResult<CalendarMonth> {
        let scope = StoreScope::resolve(user, query.store_id)?;
        let ids = scope.as_filter();
        let ids = ids.as_deref();
        let (start, end) = grid_bounds(query.year, query.month)?;

        let orders = orders::list_orders(&self.pool, ids, Some(start), Some(end)).await?;
        let deliveries = deliveries::deliveries_in_period(&self.pool, ids, start, end).await?;
        let publicities = publicities::publicities_in_period(&self.pool, start, end, ids).await?;
        let suppliers = suppliers::list_suppliers(&self.pool).await?;

        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let delivered_orders: HashSet<i64> = deliveries::delivered_order_ids(&self.pool, &order_ids)
            .await?
            .into_iter()
            .collect();

        build_month(
            query.year,
            query.month,
            Local::now().date_naive(),
            self.max_visible_per_day,
            &CalendarSources {
                orders: &orders,
                deliveries: &deliveries,
                publicities: &publicities,
                suppliers: &suppliers,
                delivered_orders: &delivered_orders,
            },
        )
    }
}
