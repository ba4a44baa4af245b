use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::commands::{require_screen, CommandResult};
use crate::models::{DashboardStats, Invoice, NamedAmount, Screen};
use crate::services::state::AppState;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    pub company_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub currency: Option<String>,
    pub category_id: Option<i64>,
}

impl DashboardFilter {
    fn matches(&self, invoice: &Invoice) -> bool {
        self.company_id.map_or(true, |id| invoice.company_id == id)
            && self
                .supplier_name
                .as_deref()
                .map_or(true, |name| invoice.supplier_name == name)
            && self
                .currency
                .as_deref()
                .map_or(true, |currency| invoice.currency == currency)
            && self.category_id.map_or(true, |id| invoice.category_id == id)
    }
}

pub fn get_dashboard_stats(state: &AppState, filter: &DashboardFilter) -> CommandResult<DashboardStats> {
    require_screen(state, Screen::Dashboard)?;
    let invoices: Vec<&Invoice> = state.invoices.iter().filter(|inv| filter.matches(inv)).collect();

    let mut by_currency: BTreeMap<&str, f64> = BTreeMap::new();
    for invoice in &invoices {
        *by_currency.entry(invoice.currency.as_str()).or_default() += invoice.total;
    }

    let by_category = state
        .categories
        .iter()
        .map(|cat| NamedAmount {
            name: cat.name.clone(),
            amount: invoices
                .iter()
                .filter(|inv| inv.category_id == cat.id)
                .map(|inv| inv.total_local)
                .sum(),
        })
        .filter(|entry| entry.amount != 0.0)
        .collect();

    Ok(DashboardStats {
        total_local: invoices.iter().map(|inv| inv.total_local).sum(),
        count: invoices.len(),
        by_currency: by_currency
            .into_iter()
            .map(|(name, amount)| NamedAmount {
                name: name.to_string(),
                amount,
            })
            .collect(),
        by_category,
        by_month: monthly_series(&invoices),
    })
}

/// Local totals per calendar month, years folded together. Invoices whose
/// date does not parse are left out of the series only.
fn monthly_series(invoices: &[&Invoice]) -> Vec<NamedAmount> {
    let mut months: BTreeMap<u32, f64> = BTreeMap::new();
    for invoice in invoices {
        match NaiveDate::parse_from_str(&invoice.date, "%Y-%m-%d") {
            Ok(date) => *months.entry(date.month0()).or_default() += invoice.total_local,
            Err(_) => tracing::debug!(invoice_id = %invoice.id, date = %invoice.date, "Undated invoice"),
        }
    }
    months
        .into_iter()
        .map(|(month0, amount)| NamedAmount {
            name: MONTHS[month0 as usize].to_string(),
            amount,
        })
        .collect()
}
