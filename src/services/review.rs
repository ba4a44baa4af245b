//! One reviewer walking one batch of documents.
//!
//! `Idle -> Reviewing(0) -> ... -> Reviewing(n - 1) -> Idle`. Both approving and
//! skipping move forward; there is no way back to an earlier document.

use thiserror::Error;

use crate::models::{AuditAction, Company, Invoice, InvoiceStatus, Supplier};
use crate::services::audit::AuditEvent;
use crate::services::extraction::RawExtraction;
use crate::services::validation::{
    derive_totals, detect_new_company, detect_new_supplier, register_new_company,
    register_new_supplier, DraftDefaults, Snapshot, ValidationDraft,
};

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub extraction: RawExtraction,
    /// Source document as a data URI; frozen onto the approved invoice.
    pub image: String,
    pub mime_type: String,
}

impl QueueItem {
    pub fn for_edit(invoice: Invoice) -> Self {
        let image = invoice.image.clone();
        let mime_type = image
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|m| !m.is_empty())
            .unwrap_or("image/jpeg")
            .to_string();
        QueueItem {
            extraction: RawExtraction::ExistingInvoiceEdit(invoice),
            image,
            mime_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueState {
    #[default]
    Idle,
    Reviewing(usize),
}

impl QueueState {
    /// Where a queue of `len` items goes after the current document is settled.
    pub fn advance(self, len: usize) -> QueueState {
        match self {
            QueueState::Reviewing(i) if i + 1 < len => QueueState::Reviewing(i + 1),
            _ => QueueState::Idle,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReviewError {
    #[error("No document is under review")]
    NothingToReview,
    #[error("Invoice #{0} has no receiving company assigned")]
    MissingCompany(String),
}

/// Changes the host applies after an approval.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    NewCompany(Company),
    NewSupplier(Supplier),
    Audit(AuditEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub invoice: Invoice,
    /// `true` when the invoice replaces an existing ledger record.
    pub is_edit: bool,
    pub next: QueueState,
    pub effects: Vec<SideEffect>,
}

#[derive(Debug, Default)]
pub struct ReviewQueue {
    items: Vec<QueueItem>,
    state: QueueState,
}

impl ReviewQueue {
    pub fn new() -> Self {
        ReviewQueue::default()
    }

    /// Replaces whatever was queued. An empty batch leaves the queue idle.
    pub fn load(&mut self, items: Vec<QueueItem>) -> QueueState {
        self.items = items;
        self.state = if self.items.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Reviewing(0)
        };
        self.state
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == QueueState::Idle
    }

    pub fn current(&self) -> Option<&QueueItem> {
        match self.state {
            QueueState::Reviewing(i) => self.items.get(i),
            QueueState::Idle => None,
        }
    }

    /// 1-based position and queue length, for display.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self.state {
            QueueState::Reviewing(i) => Some((i + 1, self.items.len())),
            QueueState::Idle => None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops the current document without touching the ledger.
    pub fn skip(&mut self) -> QueueState {
        self.advance()
    }

    fn advance(&mut self) -> QueueState {
        self.state = self.state.advance(self.items.len());
        if self.state == QueueState::Idle {
            self.items.clear();
        }
        self.state
    }

    /// Commits the reviewed draft for the current document and moves on.
    ///
    /// Flags never block approval; only an unassigned company does. On error
    /// the queue stays on the same document.
    pub fn approve(
        &mut self,
        draft: &ValidationDraft,
        snapshot: &Snapshot<'_>,
        active_prompt_id: i64,
        local_currency: &str,
    ) -> Result<Approval, ReviewError> {
        let item = self.current().ok_or(ReviewError::NothingToReview)?;
        if draft.company_id == 0 {
            return Err(ReviewError::MissingCompany(draft.invoice_number.clone()));
        }

        let mut effects = Vec::new();
        let supplier_id = if detect_new_supplier(draft, snapshot.suppliers) {
            let supplier = register_new_supplier(draft, snapshot);
            let id = supplier.id;
            effects.push(SideEffect::Audit(AuditEvent::new(
                AuditAction::RegisterSupplier,
                format!("Supplier {} created from validation", supplier.name),
            )));
            effects.insert(0, SideEffect::NewSupplier(supplier));
            Some(id)
        } else {
            snapshot
                .suppliers
                .iter()
                .find(|s| !draft.supplier_tax_id.is_empty() && s.tax_id == draft.supplier_tax_id)
                .map(|s| s.id)
        };

        let totals = derive_totals(draft, local_currency);
        let prior = item.extraction.existing_invoice();
        let is_edit = prior.is_some();

        let mut invoice = match prior {
            Some(prior) => prior.clone(),
            None => Invoice {
                id: uuid::Uuid::new_v4().to_string(),
                company_id: 0,
                supplier_id: None,
                supplier_name: String::new(),
                supplier_tax_id: String::new(),
                invoice_number: String::new(),
                control_serial: String::new(),
                date: String::new(),
                subtotal: 0.0,
                tax: 0.0,
                total: 0.0,
                currency: String::new(),
                exchange_rate: 0.0,
                total_local: 0.0,
                total_foreign: 0.0,
                status: InvoiceStatus::Pending,
                prompt_id: active_prompt_id,
                image: String::new(),
                items: Vec::new(),
                category_id: 0,
            },
        };

        invoice.company_id = draft.company_id;
        invoice.supplier_id = supplier_id.or(invoice.supplier_id);
        invoice.supplier_name = draft.supplier_name.clone();
        invoice.supplier_tax_id = draft.supplier_tax_id.clone();
        invoice.invoice_number = draft.invoice_number.clone();
        invoice.control_serial = draft.control_serial.clone();
        invoice.date = draft.date.clone();
        invoice.subtotal = draft.subtotal;
        invoice.tax = draft.tax;
        invoice.total = draft.total;
        invoice.currency = draft.currency.clone();
        invoice.exchange_rate = draft.exchange_rate;
        invoice.total_local = totals.total_local;
        invoice.total_foreign = totals.total_foreign;
        invoice.category_id = draft.category_id;
        invoice.items = draft.items.clone();
        invoice.image = item.image.clone();
        invoice.status = InvoiceStatus::Validated;

        effects.push(SideEffect::Audit(if is_edit {
            AuditEvent::new(
                AuditAction::EditInvoice,
                format!("Invoice #{} modified", invoice.invoice_number),
            )
        } else {
            AuditEvent::new(
                AuditAction::CreateInvoice,
                format!("New invoice #{} approved", invoice.invoice_number),
            )
        }));

        let next = self.advance();
        Ok(Approval {
            invoice,
            is_edit,
            next,
            effects,
        })
    }
}

/// The reviewer's "create company" action. Only applies when the document names
/// a receiving party that is not yet known; the draft is pointed at the new company.
pub fn register_detected_company(
    item: &QueueItem,
    draft: &mut ValidationDraft,
    snapshot: &Snapshot<'_>,
    defaults: &DraftDefaults,
) -> Option<Vec<SideEffect>> {
    if !detect_new_company(&item.extraction, snapshot.companies) {
        return None;
    }
    let client = item.extraction.client()?;
    let company = register_new_company(client, snapshot, defaults);
    draft.company_id = company.id;
    draft.flags.is_new_company = false;
    let event = AuditEvent::new(
        AuditAction::RegisterCompany,
        format!("Company {} created from validation", company.name),
    );
    Some(vec![SideEffect::NewCompany(company), SideEffect::Audit(event)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extraction::{ExtractedInvoice, ExtractedParty};
    use crate::services::validation::{normalize, DraftDefaults};

    fn ai_item(number: &str) -> QueueItem {
        QueueItem {
            extraction: RawExtraction::AiExtraction(ExtractedInvoice {
                supplier: Some(ExtractedParty {
                    name: Some("Acme".into()),
                    rif: Some("J-9".into()),
                }),
                invoice_number: Some(number.into()),
                total: Some(100.0),
                currency: Some("USD".into()),
                exchange_rate: Some(60.0),
                ..Default::default()
            }),
            image: "data:image/png;base64,AAAA".into(),
            mime_type: "image/png".into(),
        }
    }

    fn empty_snapshot() -> Snapshot<'static> {
        Snapshot {
            companies: &[],
            suppliers: &[],
            categories: &[],
            invoices: &[],
        }
    }

    fn draft_for(item: &QueueItem) -> ValidationDraft {
        let mut draft = normalize(&item.extraction, &[], &[], &DraftDefaults::default());
        draft.company_id = 1;
        draft
    }

    #[test]
    fn load_starts_at_first_item_and_empty_batch_stays_idle() {
        let mut queue = ReviewQueue::new();
        assert_eq!(queue.load(Vec::new()), QueueState::Idle);
        assert_eq!(queue.load(vec![ai_item("1"), ai_item("2")]), QueueState::Reviewing(0));
        assert_eq!(queue.position(), Some((1, 2)));
    }

    #[test]
    fn skipping_walks_to_idle() {
        let mut queue = ReviewQueue::new();
        queue.load(vec![ai_item("1"), ai_item("2")]);
        assert_eq!(queue.skip(), QueueState::Reviewing(1));
        assert_eq!(queue.skip(), QueueState::Idle);
        assert!(queue.is_empty());
        assert_eq!(queue.current(), None);
    }

    #[test]
    fn approving_new_document_emits_supplier_and_audit() {
        let mut queue = ReviewQueue::new();
        let item = ai_item("100");
        queue.load(vec![item.clone()]);
        let draft = draft_for(&item);

        let approval = queue.approve(&draft, &empty_snapshot(), 7, "Bs").unwrap();

        assert_eq!(approval.next, QueueState::Idle);
        assert!(!approval.is_edit);
        assert_eq!(approval.invoice.status, InvoiceStatus::Validated);
        assert_eq!(approval.invoice.prompt_id, 7);
        assert_eq!(approval.invoice.image, item.image);
        assert_eq!(approval.invoice.total_local, 6000.0);
        assert_eq!(approval.invoice.total_foreign, 100.0);
        assert_eq!(approval.invoice.supplier_id, Some(1));
        assert!(!approval.invoice.id.is_empty());

        assert!(matches!(&approval.effects[0], SideEffect::NewSupplier(s) if s.tax_id == "J-9"));
        let actions: Vec<_> = approval
            .effects
            .iter()
            .filter_map(|e| match e {
                SideEffect::Audit(event) => Some(event.action),
                _ => None,
            })
            .collect();
        assert_eq!(actions, vec![AuditAction::RegisterSupplier, AuditAction::CreateInvoice]);
    }

    #[test]
    fn duplicates_are_warned_not_blocked() {
        let existing = Invoice {
            id: "other".into(),
            ..approved_invoice()
        };
        let invoices = vec![existing];
        let snapshot = Snapshot {
            invoices: &invoices,
            ..empty_snapshot()
        };
        let mut queue = ReviewQueue::new();
        let item = ai_item("100");
        queue.load(vec![item.clone()]);
        let mut draft = draft_for(&item);
        draft.flags.is_duplicate = true;
        draft.flags.is_new_company = true;

        assert!(queue.approve(&draft, &snapshot, 1, "Bs").is_ok());
    }

    #[test]
    fn unassigned_company_is_rejected_and_queue_holds() {
        let mut queue = ReviewQueue::new();
        let item = ai_item("100");
        queue.load(vec![item.clone(), ai_item("101")]);
        let mut draft = draft_for(&item);
        draft.company_id = 0;

        let err = queue.approve(&draft, &empty_snapshot(), 1, "Bs").unwrap_err();
        assert_eq!(err, ReviewError::MissingCompany("100".into()));
        assert_eq!(queue.state(), QueueState::Reviewing(0));
    }

    #[test]
    fn approving_while_idle_fails() {
        let mut queue = ReviewQueue::new();
        let draft = draft_for(&ai_item("1"));
        assert_eq!(
            queue.approve(&draft, &empty_snapshot(), 1, "Bs").unwrap_err(),
            ReviewError::NothingToReview
        );
    }

    fn approved_invoice() -> Invoice {
        Invoice {
            id: "inv-1".into(),
            company_id: 1,
            supplier_id: Some(4),
            supplier_name: "Acme".into(),
            supplier_tax_id: "J-9".into(),
            invoice_number: "100".into(),
            control_serial: "00-1".into(),
            date: "2025-02-01".into(),
            subtotal: 80.0,
            tax: 20.0,
            total: 100.0,
            currency: "Bs".into(),
            exchange_rate: 60.0,
            total_local: 100.0,
            total_foreign: 0.0,
            status: InvoiceStatus::Validated,
            prompt_id: 3,
            image: "data:application/pdf;base64,JVBE".into(),
            items: Vec::new(),
            category_id: 2,
        }
    }

    #[test]
    fn edit_keeps_identity_and_prompt() {
        let prior = approved_invoice();
        let item = QueueItem::for_edit(prior.clone());
        assert_eq!(item.mime_type, "application/pdf");

        let suppliers = vec![Supplier {
            id: 4,
            tax_id: "J-9".into(),
            name: "Acme".into(),
            address: String::new(),
        }];
        let invoices = vec![prior.clone()];
        let snapshot = Snapshot {
            suppliers: &suppliers,
            invoices: &invoices,
            ..empty_snapshot()
        };
        let mut queue = ReviewQueue::new();
        queue.load(vec![item.clone()]);
        let mut draft = normalize(&item.extraction, &[], &[], &DraftDefaults::default());
        draft.total = 150.0;

        let approval = queue.approve(&draft, &snapshot, 9, "Bs").unwrap();
        assert!(approval.is_edit);
        assert_eq!(approval.invoice.id, prior.id);
        assert_eq!(approval.invoice.prompt_id, 3);
        assert_eq!(approval.invoice.total, 150.0);
        assert_eq!(approval.invoice.total_local, 150.0);
        assert_eq!(approval.invoice.supplier_id, Some(4));
        assert_eq!(approval.effects.len(), 1);
        assert!(matches!(
            &approval.effects[0],
            SideEffect::Audit(e) if e.action == AuditAction::EditInvoice
        ));
    }

    #[test]
    fn detected_company_is_registered_once() {
        let item = QueueItem {
            extraction: RawExtraction::AiExtraction(ExtractedInvoice {
                client: Some(ExtractedParty {
                    name: Some("Receiver C.A.".into()),
                    rif: Some("J-3".into()),
                }),
                ..Default::default()
            }),
            image: String::new(),
            mime_type: "image/png".into(),
        };
        let mut draft = normalize(&item.extraction, &[], &[], &DraftDefaults::default());
        assert_eq!(draft.company_id, 0);

        let effects =
            register_detected_company(&item, &mut draft, &empty_snapshot(), &DraftDefaults::default())
                .unwrap();
        let company = match &effects[0] {
            SideEffect::NewCompany(c) => c.clone(),
            other => panic!("unexpected effect {:?}", other),
        };
        assert_eq!(company.tax_id, "J-3");
        assert_eq!(draft.company_id, company.id);

        let companies = vec![company];
        let snapshot = Snapshot {
            companies: &companies,
            ..empty_snapshot()
        };
        assert!(register_detected_company(&item, &mut draft, &snapshot, &DraftDefaults::default()).is_none());
    }

    #[test]
    fn state_advance_table() {
        assert_eq!(QueueState::Idle.advance(3), QueueState::Idle);
        assert_eq!(QueueState::Reviewing(0).advance(3), QueueState::Reviewing(1));
        assert_eq!(QueueState::Reviewing(2).advance(3), QueueState::Idle);
        assert_eq!(QueueState::Reviewing(0).advance(1), QueueState::Idle);
    }
}
