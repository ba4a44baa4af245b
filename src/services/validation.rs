use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{Company, ExpenseCategory, Invoice, InvoiceItem, Settings, Supplier};
use crate::services::extraction::{ExtractedParty, RawExtraction};
use crate::utils::{normalize_date, parse_decimal};

const NEW_COMPANY_ADDRESS: &str = "Address detected by AI";
const NEW_SUPPLIER_ADDRESS: &str = "Registered from validation";
const DEFAULT_TAX_ID_LABEL: &str = "RIF";
const SECONDARY_CURRENCY: &str = "USD";

/// Values the normalizer falls back to when the source leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftDefaults {
    pub local_currency: String,
    pub exchange_rate: f64,
}

impl DraftDefaults {
    pub fn from_settings(settings: &Settings) -> Self {
        DraftDefaults {
            local_currency: settings.local_currency.clone(),
            exchange_rate: settings.default_exchange_rate,
        }
    }
}

impl Default for DraftDefaults {
    fn default() -> Self {
        DraftDefaults::from_settings(&Settings::default())
    }
}

/// Read-only view of master data and ledger taken at the start of an operation.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub companies: &'a [Company],
    pub suppliers: &'a [Supplier],
    pub categories: &'a [ExpenseCategory],
    pub invoices: &'a [Invoice],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftFlags {
    pub is_new_company: bool,
    pub is_new_supplier: bool,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDraft {
    pub supplier_name: String,
    pub supplier_tax_id: String,
    pub invoice_number: String,
    pub control_serial: String,
    pub date: String,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub exchange_rate: f64,
    pub company_id: i64,
    pub category_id: i64,
    pub items: Vec<InvoiceItem>,
    pub flags: DraftFlags,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedTotals {
    pub total_local: f64,
    pub total_foreign: f64,
}

/// Fields the reviewer can change on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    SupplierName,
    SupplierTaxId,
    InvoiceNumber,
    ControlSerial,
    Date,
    Subtotal,
    Tax,
    Total,
    Currency,
    ExchangeRate,
    CompanyId,
    CategoryId,
}

impl DraftField {
    /// Changing one of these can change the draft's flags.
    pub fn affects_flags(&self) -> bool {
        matches!(
            self,
            DraftField::SupplierTaxId | DraftField::InvoiceNumber | DraftField::CompanyId
        )
    }
}

impl FromStr for DraftField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "supplier_name" | "supplierName" => DraftField::SupplierName,
            "supplier_tax_id" | "supplierTaxId" | "supplierRif" | "rif" => DraftField::SupplierTaxId,
            "invoice_number" | "invoiceNumber" | "number" => DraftField::InvoiceNumber,
            "control_serial" | "controlSerial" => DraftField::ControlSerial,
            "date" => DraftField::Date,
            "subtotal" => DraftField::Subtotal,
            "tax" => DraftField::Tax,
            "total" => DraftField::Total,
            "currency" => DraftField::Currency,
            "exchange_rate" | "exchangeRate" | "rate" => DraftField::ExchangeRate,
            "company_id" | "companyId" | "company" => DraftField::CompanyId,
            "category_id" | "categoryId" | "category" => DraftField::CategoryId,
            other => return Err(format!("Unknown draft field: {}", other)),
        };
        Ok(field)
    }
}

impl ValidationDraft {
    /// Applies raw form input. Unparsable or non-finite numbers become `0`,
    /// matching how the editing form has always treated them. Dates go through
    /// the same normalization as extracted ones.
    pub fn set(&mut self, field: DraftField, value: &str) {
        let amount = || parse_decimal(value).unwrap_or(0.0);
        let id = || value.trim().parse::<i64>().unwrap_or(0);
        match field {
            DraftField::SupplierName => self.supplier_name = value.to_string(),
            DraftField::SupplierTaxId => self.supplier_tax_id = value.to_string(),
            DraftField::InvoiceNumber => self.invoice_number = value.to_string(),
            DraftField::ControlSerial => self.control_serial = value.to_string(),
            DraftField::Date => self.date = normalize_date(Some(value.to_string())).unwrap_or_default(),
            DraftField::Subtotal => self.subtotal = amount(),
            DraftField::Tax => self.tax = amount(),
            DraftField::Total => self.total = amount(),
            DraftField::Currency => self.currency = value.to_string(),
            DraftField::ExchangeRate => self.exchange_rate = amount(),
            DraftField::CompanyId => self.company_id = id(),
            DraftField::CategoryId => self.category_id = id(),
        }
    }
}

/// Builds a fully populated draft from either source shape. Never fails.
pub fn normalize(
    raw: &RawExtraction,
    companies: &[Company],
    categories: &[ExpenseCategory],
    defaults: &DraftDefaults,
) -> ValidationDraft {
    let company_id = raw
        .company_id()
        .or_else(|| {
            raw.client_tax_id()
                .and_then(|rif| companies.iter().find(|c| c.tax_id == rif))
                .map(|c| c.id)
        })
        .or_else(|| companies.first().map(|c| c.id))
        .unwrap_or(0);

    let category_id = raw
        .category_id()
        .or_else(|| categories.first().map(|c| c.id))
        .unwrap_or(1);

    let date = normalize_date(raw.date().map(str::to_string)).unwrap_or_default();

    ValidationDraft {
        supplier_name: raw.supplier_name().unwrap_or_default().to_string(),
        supplier_tax_id: raw.supplier_tax_id().unwrap_or_default().to_string(),
        invoice_number: raw.invoice_number().unwrap_or_default().to_string(),
        control_serial: raw.control_serial().unwrap_or_default().to_string(),
        date,
        subtotal: raw.subtotal().unwrap_or(0.0),
        tax: raw.tax().unwrap_or(0.0),
        total: raw.total().unwrap_or(0.0),
        currency: raw
            .currency()
            .map(str::to_string)
            .unwrap_or_else(|| defaults.local_currency.clone()),
        exchange_rate: raw.exchange_rate().unwrap_or(defaults.exchange_rate),
        company_id,
        category_id,
        items: normalize_items(raw),
        flags: DraftFlags::default(),
    }
}

fn normalize_items(raw: &RawExtraction) -> Vec<InvoiceItem> {
    match raw {
        RawExtraction::ExistingInvoiceEdit(invoice) => invoice.items.clone(),
        RawExtraction::AiExtraction(data) => data
            .items
            .iter()
            .map(|item| {
                let quantity = item.quantity.unwrap_or(1.0);
                let unit_price = item.unit_price.unwrap_or(0.0);
                InvoiceItem {
                    description: item.description.clone().unwrap_or_default(),
                    quantity,
                    unit_price,
                    line_total: item.total.unwrap_or(quantity * unit_price),
                }
            })
            .collect(),
    }
}

/// True only when the model named a receiving party whose tax id is unknown.
pub fn detect_new_company(raw: &RawExtraction, companies: &[Company]) -> bool {
    match raw.client_tax_id() {
        Some(rif) => !companies.iter().any(|c| c.tax_id == rif),
        None => false,
    }
}

pub fn detect_new_supplier(draft: &ValidationDraft, suppliers: &[Supplier]) -> bool {
    if draft.supplier_tax_id.is_empty() {
        return false;
    }
    !suppliers.iter().any(|s| s.tax_id == draft.supplier_tax_id)
}

/// Exact match on `(supplier_tax_id, invoice_number)` against every other ledger entry.
pub fn detect_duplicate(draft: &ValidationDraft, draft_id: Option<&str>, invoices: &[Invoice]) -> bool {
    invoices.iter().any(|inv| {
        Some(inv.id.as_str()) != draft_id
            && inv.supplier_tax_id == draft.supplier_tax_id
            && inv.invoice_number == draft.invoice_number
    })
}

pub fn evaluate_flags(draft: &ValidationDraft, raw: &RawExtraction, snapshot: &Snapshot<'_>) -> DraftFlags {
    DraftFlags {
        is_new_company: detect_new_company(raw, snapshot.companies),
        is_new_supplier: detect_new_supplier(draft, snapshot.suppliers),
        is_duplicate: detect_duplicate(draft, raw.existing_id(), snapshot.invoices),
    }
}

/// Recomputes the advisory flags after an edit. Totals are not stored on the
/// draft; ask `derive_totals` for them.
pub fn refresh_flags(draft: &mut ValidationDraft, raw: &RawExtraction, snapshot: &Snapshot<'_>) {
    draft.flags = evaluate_flags(draft, raw, snapshot);
}

pub fn derive_totals(draft: &ValidationDraft, local_currency: &str) -> DerivedTotals {
    if draft.currency == local_currency {
        DerivedTotals {
            total_local: draft.total,
            total_foreign: 0.0,
        }
    } else {
        DerivedTotals {
            total_local: draft.total * draft.exchange_rate,
            total_foreign: draft.total,
        }
    }
}

pub fn register_new_company(
    client: &ExtractedParty,
    snapshot: &Snapshot<'_>,
    defaults: &DraftDefaults,
) -> Company {
    let mut currencies = vec![defaults.local_currency.clone()];
    if defaults.local_currency != SECONDARY_CURRENCY {
        currencies.push(SECONDARY_CURRENCY.to_string());
    }
    Company {
        id: snapshot.next_company_id(),
        tax_id: client.rif.clone().unwrap_or_default(),
        name: client.name.clone().unwrap_or_default(),
        address: NEW_COMPANY_ADDRESS.to_string(),
        currencies,
        tax_id_label: DEFAULT_TAX_ID_LABEL.to_string(),
    }
}

pub fn register_new_supplier(draft: &ValidationDraft, snapshot: &Snapshot<'_>) -> Supplier {
    Supplier {
        id: snapshot.next_supplier_id(),
        tax_id: draft.supplier_tax_id.clone(),
        name: draft.supplier_name.clone(),
        address: NEW_SUPPLIER_ADDRESS.to_string(),
    }
}

pub fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

/// Fresh ids also clear every id the ledger still points at, so a deleted
/// record's id is never handed to a different entity.
impl Snapshot<'_> {
    pub fn next_company_id(&self) -> i64 {
        next_id(
            self.companies
                .iter()
                .map(|c| c.id)
                .chain(self.invoices.iter().map(|inv| inv.company_id)),
        )
    }

    pub fn next_supplier_id(&self) -> i64 {
        next_id(
            self.suppliers
                .iter()
                .map(|s| s.id)
                .chain(self.invoices.iter().filter_map(|inv| inv.supplier_id)),
        )
    }

    pub fn next_category_id(&self) -> i64 {
        next_id(
            self.categories
                .iter()
                .map(|c| c.id)
                .chain(self.invoices.iter().map(|inv| inv.category_id)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;
    use crate::services::extraction::ExtractedInvoice;
    use proptest::prelude::*;

    fn company(id: i64, rif: &str) -> Company {
        Company {
            id,
            tax_id: rif.to_string(),
            name: format!("Company {}", id),
            address: String::new(),
            currencies: vec!["Bs".into()],
            tax_id_label: "RIF".into(),
        }
    }

    fn category(id: i64) -> ExpenseCategory {
        ExpenseCategory {
            id,
            name: format!("Category {}", id),
            code: None,
        }
    }

    fn ledger_invoice(id: &str, rif: &str, number: &str) -> Invoice {
        Invoice {
            id: id.to_string(),
            company_id: 1,
            supplier_id: None,
            supplier_name: "Acme".into(),
            supplier_tax_id: rif.to_string(),
            invoice_number: number.to_string(),
            control_serial: String::new(),
            date: "2025-01-10".into(),
            subtotal: 0.0,
            tax: 0.0,
            total: 10.0,
            currency: "Bs".into(),
            exchange_rate: 60.0,
            total_local: 10.0,
            total_foreign: 0.0,
            status: InvoiceStatus::Validated,
            prompt_id: 1,
            image: String::new(),
            items: Vec::new(),
            category_id: 3,
        }
    }

    fn ai(data: ExtractedInvoice) -> RawExtraction {
        RawExtraction::AiExtraction(data)
    }

    fn party(name: &str, rif: &str) -> Option<ExtractedParty> {
        Some(ExtractedParty {
            name: Some(name.into()),
            rif: Some(rif.into()),
        })
    }

    fn draft_with(currency: &str, total: f64, rate: f64) -> ValidationDraft {
        let mut draft = normalize(&ai(ExtractedInvoice::default()), &[], &[], &DraftDefaults::default());
        draft.currency = currency.to_string();
        draft.total = total;
        draft.exchange_rate = rate;
        draft
    }

    #[test]
    fn empty_extraction_gets_every_default() {
        let draft = normalize(&ai(ExtractedInvoice::default()), &[], &[], &DraftDefaults::default());
        assert_eq!(draft.company_id, 0);
        assert_eq!(draft.category_id, 1);
        assert_eq!(draft.exchange_rate, 60.0);
        assert_eq!(draft.currency, "Bs");
        assert_eq!(draft.supplier_name, "");
        assert_eq!(draft.supplier_tax_id, "");
        assert_eq!(draft.total, 0.0);
        assert_eq!(draft.flags, DraftFlags::default());
    }

    #[test]
    fn defaults_come_from_configuration() {
        let defaults = DraftDefaults {
            local_currency: "VES".into(),
            exchange_rate: 36.5,
        };
        let draft = normalize(&ai(ExtractedInvoice::default()), &[], &[], &defaults);
        assert_eq!(draft.currency, "VES");
        assert_eq!(draft.exchange_rate, 36.5);
    }

    #[test]
    fn company_resolved_by_client_tax_id_then_first_company() {
        let companies = vec![company(1, "J-1"), company(7, "J-7")];
        let matched = normalize(
            &ai(ExtractedInvoice {
                client: party("Seven", "J-7"),
                ..Default::default()
            }),
            &companies,
            &[],
            &DraftDefaults::default(),
        );
        assert_eq!(matched.company_id, 7);

        let unmatched = normalize(
            &ai(ExtractedInvoice {
                client: party("Other", "J-99"),
                ..Default::default()
            }),
            &companies,
            &[],
            &DraftDefaults::default(),
        );
        assert_eq!(unmatched.company_id, 1);
    }

    #[test]
    fn category_defaults_to_first_known() {
        let draft = normalize(
            &ai(ExtractedInvoice::default()),
            &[],
            &[category(4), category(2)],
            &DraftDefaults::default(),
        );
        assert_eq!(draft.category_id, 4);
    }

    #[test]
    fn existing_invoice_keeps_its_fields() {
        let invoice = ledger_invoice("abc", "J-1", "100");
        let raw = RawExtraction::ExistingInvoiceEdit(invoice.clone());
        let draft = normalize(&raw, &[company(1, "J-1")], &[category(1)], &DraftDefaults::default());
        assert_eq!(draft.company_id, 1);
        assert_eq!(draft.category_id, 3);
        assert_eq!(draft.invoice_number, "100");
        assert_eq!(draft.supplier_tax_id, "J-1");
        assert_eq!(draft.date, "2025-01-10");
    }

    #[test]
    fn extracted_items_fill_missing_line_totals() {
        let data: ExtractedInvoice = serde_json::from_value(serde_json::json!({
            "items": [{"description": "Paper", "quantity": 2, "unitPrice": 3.5}]
        }))
        .unwrap();
        let draft = normalize(&ai(data), &[], &[], &DraftDefaults::default());
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].line_total, 7.0);
    }

    #[test]
    fn new_company_only_for_unknown_client() {
        let companies = vec![company(1, "J-1")];
        let unknown = ai(ExtractedInvoice {
            client: party("New", "J-2"),
            ..Default::default()
        });
        let known = ai(ExtractedInvoice {
            client: party("Known", "J-1"),
            ..Default::default()
        });
        let no_client = ai(ExtractedInvoice::default());
        let edit = RawExtraction::ExistingInvoiceEdit(ledger_invoice("x", "J-5", "1"));

        assert!(detect_new_company(&unknown, &companies));
        assert!(!detect_new_company(&known, &companies));
        assert!(!detect_new_company(&no_client, &companies));
        assert!(!detect_new_company(&edit, &[]));
    }

    #[test]
    fn new_supplier_clears_after_registration() {
        let mut draft = draft_with("USD", 100.0, 60.0);
        draft.supplier_name = "Acme".into();
        draft.supplier_tax_id = "J-9".into();
        let mut suppliers = Vec::new();

        assert!(detect_new_supplier(&draft, &suppliers));
        let snapshot = Snapshot {
            companies: &[],
            suppliers: &suppliers,
            categories: &[],
            invoices: &[],
        };
        let created = register_new_supplier(&draft, &snapshot);
        assert_eq!(created.id, 1);
        assert_eq!(created.name, "Acme");
        suppliers.push(created);
        assert!(!detect_new_supplier(&draft, &suppliers));
    }

    #[test]
    fn empty_supplier_tax_id_is_never_new() {
        let draft = draft_with("Bs", 1.0, 1.0);
        assert!(!detect_new_supplier(&draft, &[]));
    }

    #[test]
    fn duplicate_needs_both_fields_and_another_id() {
        let invoices = vec![ledger_invoice("A", "J-1", "100")];
        let mut draft = draft_with("Bs", 1.0, 1.0);
        draft.supplier_tax_id = "J-1".into();
        draft.invoice_number = "100".into();

        assert!(detect_duplicate(&draft, None, &invoices));
        assert!(detect_duplicate(&draft, Some("B"), &invoices));
        assert!(!detect_duplicate(&draft, Some("A"), &invoices));

        draft.invoice_number = "101".into();
        assert!(!detect_duplicate(&draft, None, &invoices));

        draft.invoice_number = "100".into();
        draft.supplier_tax_id = "J-2".into();
        assert!(!detect_duplicate(&draft, None, &invoices));
    }

    #[test]
    fn duplicate_matching_is_exact() {
        let invoices = vec![ledger_invoice("A", "J-1", "100")];
        let mut draft = draft_with("Bs", 1.0, 1.0);
        draft.supplier_tax_id = "j-1".into();
        draft.invoice_number = "100".into();
        assert!(!detect_duplicate(&draft, None, &invoices));

        draft.supplier_tax_id = "J-1 ".into();
        assert!(!detect_duplicate(&draft, None, &invoices));
    }

    #[test]
    fn refresh_flags_tracks_edits() {
        let invoices = vec![ledger_invoice("A", "J-1", "100")];
        let snapshot = Snapshot {
            companies: &[],
            suppliers: &[],
            categories: &[],
            invoices: &invoices,
        };
        let raw = ai(ExtractedInvoice::default());
        let mut draft = normalize(&raw, &[], &[], &DraftDefaults::default());
        refresh_flags(&mut draft, &raw, &snapshot);
        assert!(!draft.flags.is_new_supplier);

        draft.set(DraftField::SupplierTaxId, "J-1");
        draft.set(DraftField::InvoiceNumber, "100");
        refresh_flags(&mut draft, &raw, &snapshot);
        assert!(draft.flags.is_new_supplier);
        assert!(draft.flags.is_duplicate);
    }

    #[test]
    fn set_parses_numbers_leniently() {
        let mut draft = draft_with("Bs", 0.0, 1.0);
        draft.set(DraftField::Total, "1.234,50");
        draft.set(DraftField::ExchangeRate, "oops");
        draft.set(DraftField::CompanyId, "3");
        assert_eq!(draft.total, 1234.5);
        assert_eq!(draft.exchange_rate, 0.0);
        assert_eq!(draft.company_id, 3);
        assert_eq!("rif".parse::<DraftField>(), Ok(DraftField::SupplierTaxId));
        assert!("colour".parse::<DraftField>().is_err());
    }

    #[test]
    fn set_turns_non_finite_amounts_into_zero() {
        let mut draft = draft_with("USD", 10.0, 60.0);
        draft.set(DraftField::Total, "NaN");
        draft.set(DraftField::Tax, "inf");
        draft.set(DraftField::Subtotal, "1e400");
        draft.set(DraftField::ExchangeRate, "-infinity");
        assert_eq!((draft.total, draft.tax, draft.subtotal, draft.exchange_rate), (0.0, 0.0, 0.0, 0.0));
        let totals = derive_totals(&draft, "Bs");
        assert!(totals.total_local.is_finite());
    }

    #[test]
    fn set_normalizes_typed_dates() {
        let mut draft = draft_with("Bs", 0.0, 1.0);
        draft.set(DraftField::Date, "31/01/2025");
        assert_eq!(draft.date, "2025-01-31");
        draft.set(DraftField::Date, "  ");
        assert_eq!(draft.date, "");
        draft.set(DraftField::Date, "sometime");
        assert_eq!(draft.date, "sometime");
    }

    #[test]
    fn new_company_gets_local_and_usd() {
        let client = ExtractedParty {
            name: Some("Receiver".into()),
            rif: Some("J-3".into()),
        };
        let companies = [company(5, "J-5")];
        let snapshot = Snapshot {
            companies: &companies,
            suppliers: &[],
            categories: &[],
            invoices: &[],
        };
        let created = register_new_company(&client, &snapshot, &DraftDefaults::default());
        assert_eq!(created.id, 6);
        assert_eq!(created.tax_id, "J-3");
        assert_eq!(created.currencies, vec!["Bs".to_string(), "USD".to_string()]);
    }

    #[test]
    fn fresh_ids_skip_ids_still_referenced_by_the_ledger() {
        let mut invoice = ledger_invoice("a", "J-1", "100");
        invoice.company_id = 7;
        invoice.supplier_id = Some(4);
        invoice.category_id = 9;
        let invoices = [invoice];
        let companies = [company(2, "J-2")];
        let categories = [category(1)];
        let snapshot = Snapshot {
            companies: &companies,
            suppliers: &[],
            categories: &categories,
            invoices: &invoices,
        };
        assert_eq!(snapshot.next_company_id(), 8);
        assert_eq!(snapshot.next_supplier_id(), 5);
        assert_eq!(snapshot.next_category_id(), 10);

        let empty = Snapshot {
            companies: &[],
            suppliers: &[],
            categories: &[],
            invoices: &[],
        };
        assert_eq!(empty.next_supplier_id(), 1);
    }

    #[test]
    fn scenario_foreign_invoice_from_new_supplier() {
        let data: ExtractedInvoice = serde_json::from_value(serde_json::json!({
            "supplier": {"name": "Acme", "rif": "J-9"},
            "total": 100,
            "currency": "USD",
            "exchangeRate": 60
        }))
        .unwrap();
        let raw = ai(data);
        let snapshot = Snapshot {
            companies: &[],
            suppliers: &[],
            categories: &[],
            invoices: &[],
        };
        let mut draft = normalize(&raw, &[], &[], &DraftDefaults::default());
        refresh_flags(&mut draft, &raw, &snapshot);

        assert!(draft.flags.is_new_supplier);
        let totals = derive_totals(&draft, "Bs");
        assert_eq!(totals.total_local, 6000.0);
        assert_eq!(totals.total_foreign, 100.0);
    }

    proptest! {
        #[test]
        fn derivation_is_idempotent(total in 0.0f64..1e9, rate in 0.0f64..1e4, local in any::<bool>()) {
            let draft = draft_with(if local { "Bs" } else { "USD" }, total, rate);
            prop_assert_eq!(derive_totals(&draft, "Bs"), derive_totals(&draft, "Bs"));
        }

        #[test]
        fn local_currency_is_identity(total in -1e9f64..1e9, rate in 0.0f64..1e4) {
            let draft = draft_with("Bs", total, rate);
            let totals = derive_totals(&draft, "Bs");
            prop_assert_eq!(totals.total_local, total);
            prop_assert_eq!(totals.total_foreign, 0.0);
        }

        #[test]
        fn foreign_currency_is_converted(total in 0.0f64..1e9, rate in 0.0f64..1e4) {
            let draft = draft_with("USD", total, rate);
            let totals = derive_totals(&draft, "Bs");
            let expected = total * rate;
            prop_assert!((totals.total_local - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            prop_assert_eq!(totals.total_foreign, total);
        }
    }
}
