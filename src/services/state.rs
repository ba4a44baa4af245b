use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::db::{Collection, Database};
use crate::models::{
    AiPrompt, AuditLogEntry, Company, ExpenseCategory, Invoice, Role, RolePermissionTable,
    RolePermissions, Settings, Supplier, User,
};
use crate::services::audit::{AuditEvent, AuditLog};
use crate::services::permissions::PermissionMatrix;
use crate::services::review::{Approval, ReviewQueue, SideEffect};
use crate::services::validation::{DraftDefaults, Snapshot, ValidationDraft};

const FALLBACK_PROMPT_ID: i64 = 1;

const EXTRACTION_PROMPT: &str = r#"Analyze the document and return ONLY a JSON object with this structure:
{
  "client": { "name": "Name of the receiving company", "rif": "Tax id of the receiver" },
  "supplier": { "name": "Name of the supplier/issuer", "rif": "Tax id of the issuer" },
  "invoiceNumber": "Invoice number",
  "controlSerial": "Control number",
  "date": "YYYY-MM-DD",
  "currency": "Bs or USD",
  "subtotal": 0.00,
  "tax": 0.00,
  "total": 0.00,
  "exchangeRate": 60.0,
  "items": [{"description": "item", "quantity": 1, "unitPrice": 0, "total": 0}]
}
If a value cannot be found, use null. Do not invent data."#;

/// Everything one host session works on: collections, the acting user and the
/// review in progress. Loaded once, saved after each state change.
#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,
    pub current_user: User,
    pub users: Vec<User>,
    pub invoices: Vec<Invoice>,
    pub companies: Vec<Company>,
    pub suppliers: Vec<Supplier>,
    pub categories: Vec<ExpenseCategory>,
    pub prompts: Vec<AiPrompt>,
    pub permissions: PermissionMatrix,
    pub audit: AuditLog,
    pub queue: ReviewQueue,
    pub draft: Option<ValidationDraft>,
    dirty: BTreeSet<Collection>,
}

pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: "u1".into(),
            name: "System Administrator".into(),
            email: "admin@smartinvoice.ai".into(),
            role: Role::Admin,
        },
        User {
            id: "u2".into(),
            name: "Accounting Manager".into(),
            email: "manager@smartinvoice.ai".into(),
            role: Role::Editor,
        },
        User {
            id: "u3".into(),
            name: "Upload Operator".into(),
            email: "loader@smartinvoice.ai".into(),
            role: Role::Loader,
        },
    ]
}

pub fn seed_companies() -> Vec<Company> {
    vec![Company {
        id: 1,
        tax_id: "J-12345678-9".into(),
        name: "Distribuidora Global C.A.".into(),
        address: "Av. Libertador, Caracas".into(),
        currencies: vec!["Bs".into(), "USD".into()],
        tax_id_label: "RIF".into(),
    }]
}

pub fn seed_categories() -> Vec<ExpenseCategory> {
    ["Operativo", "Impuestos", "Nómina", "Mantenimiento", "Suministros"]
        .iter()
        .enumerate()
        .map(|(i, name)| ExpenseCategory {
            id: i as i64 + 1,
            name: name.to_string(),
            code: None,
        })
        .collect()
}

pub fn seed_prompts() -> Vec<AiPrompt> {
    vec![AiPrompt {
        id: 1,
        title: "Strict fiscal extraction".into(),
        content: EXTRACTION_PROMPT.into(),
        is_active: true,
    }]
}

fn read_collection<T: DeserializeOwned>(db: &Database, collection: Collection) -> Result<Option<T>> {
    match db.get_collection(collection)? {
        Some(payload) => {
            let value = serde_json::from_str(&payload)
                .with_context(|| format!("Corrupt collection {}", collection.key()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn write_collection<T: Serialize + ?Sized>(db: &Database, collection: Collection, value: &T) -> Result<()> {
    let payload = serde_json::to_string(value)?;
    db.put_collection(collection, &payload)?;
    Ok(())
}

impl AppState {
    /// A fresh session with the seed master data. All collections start dirty.
    pub fn seeded(settings: Settings) -> Self {
        let users = seed_users();
        AppState {
            settings,
            current_user: users[0].clone(),
            users,
            invoices: Vec::new(),
            companies: seed_companies(),
            suppliers: Vec::new(),
            categories: seed_categories(),
            prompts: seed_prompts(),
            permissions: PermissionMatrix::default(),
            audit: AuditLog::default(),
            queue: ReviewQueue::new(),
            draft: None,
            dirty: Collection::ALL.iter().copied().collect(),
        }
    }

    /// Stored collections replace the seeds; missing ones keep the seed and
    /// are written on the next save.
    pub fn load(db: &Database, settings: Settings) -> Result<Self> {
        let mut state = AppState::seeded(settings);
        state.dirty.clear();

        macro_rules! restore {
            ($collection:expr, $field:ident) => {
                match read_collection(db, $collection)? {
                    Some(value) => state.$field = value,
                    None => {
                        state.dirty.insert($collection);
                    }
                }
            };
        }

        restore!(Collection::Users, users);
        restore!(Collection::Invoices, invoices);
        restore!(Collection::Companies, companies);
        restore!(Collection::Suppliers, suppliers);
        restore!(Collection::Categories, categories);
        restore!(Collection::Prompts, prompts);

        match read_collection::<RolePermissionTable>(db, Collection::RolePermissions)? {
            Some(table) => state.permissions = PermissionMatrix::from_table(table),
            None => {
                state.dirty.insert(Collection::RolePermissions);
            }
        }
        match read_collection::<Vec<AuditLogEntry>>(db, Collection::AuditLogs)? {
            Some(entries) => state.audit = AuditLog::from_entries(entries),
            None => {
                state.dirty.insert(Collection::AuditLogs);
            }
        }

        if let Some(first) = state.users.first() {
            state.current_user = first.clone();
        }

        tracing::info!(
            invoices = state.invoices.len(),
            companies = state.companies.len(),
            suppliers = state.suppliers.len(),
            "State loaded"
        );
        Ok(state)
    }

    pub fn save(&mut self, db: &Database) -> Result<()> {
        let pending: Vec<Collection> = self.dirty.iter().copied().collect();
        for collection in pending {
            match collection {
                Collection::Invoices => write_collection(db, collection, &self.invoices)?,
                Collection::Companies => write_collection(db, collection, &self.companies)?,
                Collection::Suppliers => write_collection(db, collection, &self.suppliers)?,
                Collection::Categories => write_collection(db, collection, &self.categories)?,
                Collection::Users => write_collection(db, collection, &self.users)?,
                Collection::AuditLogs => write_collection(db, collection, self.audit.entries())?,
                Collection::RolePermissions => write_collection(db, collection, &self.permissions)?,
                Collection::Prompts => write_collection(db, collection, &self.prompts)?,
            }
            self.dirty.remove(&collection);
            tracing::debug!(collection = collection.key(), "Collection saved");
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, collection: Collection) {
        self.dirty.insert(collection);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            companies: &self.companies,
            suppliers: &self.suppliers,
            categories: &self.categories,
            invoices: &self.invoices,
        }
    }

    pub fn defaults(&self) -> DraftDefaults {
        DraftDefaults::from_settings(&self.settings)
    }

    pub fn active_prompt(&self) -> Option<&AiPrompt> {
        self.prompts.iter().find(|p| p.is_active)
    }

    pub fn active_prompt_id(&self) -> i64 {
        self.active_prompt().map(|p| p.id).unwrap_or(FALLBACK_PROMPT_ID)
    }

    pub fn current_permissions(&self) -> RolePermissions {
        self.permissions.permissions_for(self.current_user.role)
    }

    pub fn switch_user(&mut self, user_id: &str) -> Result<()> {
        let user = self
            .users
            .iter()
            .find(|u| u.id == user_id || u.email == user_id)
            .ok_or_else(|| anyhow!("Unknown user: {}", user_id))?;
        self.current_user = user.clone();
        Ok(())
    }

    /// Stamps the event with the acting user and appends it to the log.
    pub fn record(&mut self, event: AuditEvent) -> &AuditLogEntry {
        self.dirty.insert(Collection::AuditLogs);
        self.audit.record(&self.current_user, event)
    }

    pub fn apply_effects(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::NewCompany(company) => {
                    tracing::info!(company_id = company.id, tax_id = %company.tax_id, "Company registered");
                    self.companies.push(company);
                    self.dirty.insert(Collection::Companies);
                }
                SideEffect::NewSupplier(supplier) => {
                    tracing::info!(supplier_id = supplier.id, tax_id = %supplier.tax_id, "Supplier registered");
                    self.suppliers.push(supplier);
                    self.dirty.insert(Collection::Suppliers);
                }
                SideEffect::Audit(event) => {
                    self.record(event);
                }
            }
        }
    }

    /// Applies an approval: side effects first, then the ledger write.
    /// New invoices go to the front; edits replace the record in place.
    pub fn commit(&mut self, approval: Approval) {
        let Approval {
            invoice,
            is_edit,
            effects,
            ..
        } = approval;
        self.apply_effects(effects);

        let existing = self.invoices.iter().position(|inv| inv.id == invoice.id);
        tracing::info!(invoice_id = %invoice.id, number = %invoice.invoice_number, edit = is_edit, "Invoice committed");
        match existing {
            Some(index) if is_edit => self.invoices[index] = invoice,
            _ => self.invoices.insert(0, invoice),
        }
        self.dirty.insert(Collection::Invoices);
        self.draft = None;
    }

    pub fn company_name(&self, id: i64) -> Option<&str> {
        self.companies.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }

    pub fn category_name(&self, id: i64) -> Option<&str> {
        self.categories.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditAction, InvoiceStatus};
    use crate::services::review::QueueState;

    fn invoice(id: &str, number: &str) -> Invoice {
        Invoice {
            id: id.into(),
            company_id: 1,
            supplier_id: None,
            supplier_name: "Acme".into(),
            supplier_tax_id: "J-9".into(),
            invoice_number: number.into(),
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
            category_id: 1,
        }
    }

    #[test]
    fn seeds_match_initial_master_data() {
        let state = AppState::seeded(Settings::default());
        assert_eq!(state.users.len(), 3);
        assert_eq!(state.current_user.role, Role::Admin);
        assert_eq!(state.companies[0].tax_id, "J-12345678-9");
        assert_eq!(state.categories.len(), 5);
        assert_eq!(state.categories[2].name, "Nómina");
        assert_eq!(state.active_prompt_id(), 1);
        assert!(state.is_dirty());
    }

    #[test]
    fn load_on_empty_database_keeps_seeds_and_save_clears_dirty() {
        let db = Database::in_memory().unwrap();
        let mut state = AppState::load(&db, Settings::default()).unwrap();
        assert!(state.is_dirty());
        state.save(&db).unwrap();
        assert!(!state.is_dirty());
        assert!(db.get_collection(Collection::Companies).unwrap().is_some());
        assert_eq!(db.get_collection(Collection::Invoices).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn commit_inserts_new_and_replaces_edits() {
        let mut state = AppState::seeded(Settings::default());
        state.invoices = vec![invoice("a", "1")];

        state.commit(Approval {
            invoice: invoice("b", "2"),
            is_edit: false,
            next: QueueState::Idle,
            effects: Vec::new(),
        });
        assert_eq!(state.invoices[0].id, "b");

        let mut edited = invoice("a", "1");
        edited.total = 99.0;
        state.commit(Approval {
            invoice: edited,
            is_edit: true,
            next: QueueState::Idle,
            effects: vec![SideEffect::Audit(AuditEvent::new(AuditAction::EditInvoice, "Invoice #1 modified"))],
        });
        assert_eq!(state.invoices.len(), 2);
        assert_eq!(state.invoices[1].total, 99.0);
        assert_eq!(state.audit.entries()[0].action, AuditAction::EditInvoice);
        assert_eq!(state.audit.entries()[0].actor_id, "u1");
    }

    #[test]
    fn switching_user_changes_audit_actor() {
        let mut state = AppState::seeded(Settings::default());
        state.switch_user("u3").unwrap();
        assert!(!state.current_permissions().can_edit_invoices);
        state.record(AuditEvent::new(AuditAction::SaveMaster, "x"));
        assert_eq!(state.audit.entries()[0].actor_role, Role::Loader);
        assert!(state.switch_user("nobody").is_err());
    }
}
