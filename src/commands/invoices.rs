use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::commands::{require_action, require_screen, CommandError, CommandResult};
use crate::db::Collection;
use crate::models::{AuditAction, Invoice, InvoiceSummary, Screen};
use crate::services::audit::AuditEvent;
use crate::services::permissions::Action;
use crate::services::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    /// Case-insensitive match on number, supplier name or supplier tax id.
    pub search: Option<String>,
    pub company_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub category_id: Option<i64>,
    pub currency: Option<String>,
    /// Inclusive `YYYY-MM-DD` bounds.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        let search_match = self
            .search
            .as_deref()
            .map(|term| {
                let term = term.to_lowercase();
                invoice.invoice_number.to_lowercase().contains(&term)
                    || invoice.supplier_name.to_lowercase().contains(&term)
                    || invoice.supplier_tax_id.to_lowercase().contains(&term)
            })
            .unwrap_or(true);

        search_match
            && self.company_id.map_or(true, |id| invoice.company_id == id)
            && self
                .supplier_name
                .as_deref()
                .map_or(true, |name| invoice.supplier_name == name)
            && self.category_id.map_or(true, |id| invoice.category_id == id)
            && self
                .currency
                .as_deref()
                .map_or(true, |currency| invoice.currency == currency)
            && self
                .date_from
                .as_deref()
                .map_or(true, |from| invoice.date.as_str() >= from)
            && self
                .date_to
                .as_deref()
                .map_or(true, |to| invoice.date.as_str() <= to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    InvoiceNumber,
    Supplier,
    Company,
    Category,
    Currency,
    Total,
    TotalLocal,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(SortKey::Date),
            "number" | "invoiceNumber" => Ok(SortKey::InvoiceNumber),
            "supplier" | "supplierName" => Ok(SortKey::Supplier),
            "company" | "companyId" => Ok(SortKey::Company),
            "category" | "categoryId" => Ok(SortKey::Category),
            "currency" => Ok(SortKey::Currency),
            "total" => Ok(SortKey::Total),
            "local" | "totalLocal" => Ok(SortKey::TotalLocal),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceSort {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for InvoiceSort {
    fn default() -> Self {
        InvoiceSort {
            key: SortKey::Date,
            descending: true,
        }
    }
}

fn compare(state: &AppState, key: SortKey, a: &Invoice, b: &Invoice) -> Ordering {
    match key {
        SortKey::Date => a.date.cmp(&b.date),
        SortKey::InvoiceNumber => a.invoice_number.cmp(&b.invoice_number),
        SortKey::Supplier => a.supplier_name.cmp(&b.supplier_name),
        SortKey::Company => state
            .company_name(a.company_id)
            .unwrap_or_default()
            .cmp(&state.company_name(b.company_id).unwrap_or_default()),
        SortKey::Category => state
            .category_name(a.category_id)
            .unwrap_or_default()
            .cmp(&state.category_name(b.category_id).unwrap_or_default()),
        SortKey::Currency => a.currency.cmp(&b.currency),
        SortKey::Total => a.total.total_cmp(&b.total),
        SortKey::TotalLocal => a.total_local.total_cmp(&b.total_local),
    }
}

pub fn list_invoices<'a>(
    state: &'a AppState,
    filter: &InvoiceFilter,
    sort: InvoiceSort,
) -> CommandResult<Vec<&'a Invoice>> {
    require_screen(state, Screen::Invoices)?;
    let mut invoices: Vec<&Invoice> = state.invoices.iter().filter(|inv| filter.matches(inv)).collect();
    invoices.sort_by(|a, b| {
        let ordering = compare(state, sort.key, a, b);
        if sort.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(invoices)
}

pub fn get_invoice_summaries(
    state: &AppState,
    filter: &InvoiceFilter,
    sort: InvoiceSort,
) -> CommandResult<Vec<InvoiceSummary>> {
    let summaries = list_invoices(state, filter, sort)?
        .into_iter()
        .map(|inv| InvoiceSummary {
            id: inv.id.clone(),
            date: inv.date.clone(),
            invoice_number: inv.invoice_number.clone(),
            supplier_name: inv.supplier_name.clone(),
            company_name: state.company_name(inv.company_id).unwrap_or("N/A").to_string(),
            category_name: state.category_name(inv.category_id).unwrap_or("N/A").to_string(),
            currency: inv.currency.clone(),
            total: inv.total,
            total_local: inv.total_local,
        })
        .collect();
    Ok(summaries)
}

pub fn get_invoice_detail<'a>(state: &'a AppState, invoice_id: &str) -> CommandResult<&'a Invoice> {
    require_screen(state, Screen::Invoices)?;
    state
        .invoices
        .iter()
        .find(|inv| inv.id == invoice_id)
        .ok_or_else(|| CommandError::NotFound(format!("invoice {}", invoice_id)))
}

pub fn delete_invoice(state: &mut AppState, invoice_id: &str) -> CommandResult<Invoice> {
    require_action(state, Action::DeleteInvoices)?;
    let index = state
        .invoices
        .iter()
        .position(|inv| inv.id == invoice_id)
        .ok_or_else(|| CommandError::NotFound(format!("invoice {}", invoice_id)))?;
    let removed = state.invoices.remove(index);
    state.mark_dirty(Collection::Invoices);
    state.record(AuditEvent::new(
        AuditAction::DeleteInvoice,
        format!("Invoice #{} deleted", removed.invoice_number),
    ));
    Ok(removed)
}
