//! Sales analytics for the dashboard.
//!
//! Periods are identified by month index only (0 = January … 11 = December).
//! "Previous month" of January is December, without looking at the year, and
//! the monthly series folds every year into the same twelve buckets. Both are
//! deliberate approximations kept for compatibility with existing dashboards.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{Customer, Order};
use crate::domain::value_objects::PercentChange;

const MONTH_LABELS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_orders: usize,
    pub total_revenue: Decimal,
    pub sales_percentage_difference: String,
    pub sales_raw_difference: Decimal,
    pub orders_percentage_difference: String,
    pub orders_raw_difference: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub total_customers: usize,
    pub customer_percentage_difference: String,
    pub customer_raw_difference: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales { pub month_label: &'static str, pub sales: Decimal }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_sales: SalesSummary,
    pub total_customers: CustomerSummary,
    pub sales_per_month: Vec<MonthlySales>,
}

/// `(current, previous)` month indexes relative to `now`.
pub fn comparison_months(now: DateTime<Utc>) -> (u32, u32) {
    let current = now.month0();
    (current, if current == 0 { 11 } else { current - 1 })
}

fn revenue<'a>(orders: impl Iterator<Item = &'a Order>) -> Decimal {
    orders.map(|o| o.total_amount).sum()
}

pub fn total_sales(orders: &[Order], now: DateTime<Utc>) -> SalesSummary {
    let (current, previous) = comparison_months(now);
    let in_month = |m: u32| orders.iter().filter(move |o| o.created_at.month0() == m);

    let sales = PercentChange::between(revenue(in_month(current)), revenue(in_month(previous)));
    let count = PercentChange::between(Decimal::from(in_month(current).count()), Decimal::from(in_month(previous).count()));

    SalesSummary {
        total_orders: orders.len(),
        total_revenue: revenue(orders.iter()),
        sales_percentage_difference: sales.formatted,
        sales_raw_difference: sales.raw,
        orders_percentage_difference: count.formatted,
        orders_raw_difference: count.raw,
    }
}

pub fn total_customers(customers: &[Customer], now: DateTime<Utc>) -> CustomerSummary {
    let (current, previous) = comparison_months(now);
    let joined_in = |m: u32| customers.iter().filter(|c| c.created_at.month0() == m).count();
    let change = PercentChange::between(Decimal::from(joined_in(current)), Decimal::from(joined_in(previous)));
    CustomerSummary {
        total_customers: customers.len(),
        customer_percentage_difference: change.formatted,
        customer_raw_difference: change.raw,
    }
}

/// Twelve entries, January first, zero for months without orders.
pub fn sales_per_month(orders: &[Order]) -> Vec<MonthlySales> {
    let mut buckets = [Decimal::ZERO; 12];
    for order in orders {
        if let Some(bucket) = buckets.get_mut(order.created_at.month0() as usize) {
            *bucket += order.total_amount;
        }
    }
    MONTH_LABELS.iter().zip(buckets).map(|(&month_label, sales)| MonthlySales { month_label, sales }).collect()
}

pub fn dashboard(orders: &[Order], customers: &[Customer], now: DateTime<Utc>) -> DashboardMetrics {
    DashboardMetrics {
        total_sales: total_sales(orders, now),
        total_customers: total_customers(customers, now),
        sales_per_month: sales_per_month(orders),
    }
}
