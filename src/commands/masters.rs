use crate::commands::{require_action, require_screen, CommandError, CommandResult};
use crate::db::Collection;
use crate::models::{AuditAction, Company, ExpenseCategory, Screen, Supplier};
use crate::services::audit::AuditEvent;
use crate::services::permissions::Action;
use crate::services::state::AppState;

/// A master-data row editable from its own screen.
pub trait MasterRecord: Clone {
    const KIND: &'static str;
    const SCREEN: Screen;
    const COLLECTION: Collection;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn label(&self) -> &str;
    fn records(state: &AppState) -> &[Self];
    fn records_mut(state: &mut AppState) -> &mut Vec<Self>;
    /// An id no live record and no ledger invoice uses.
    fn fresh_id(state: &AppState) -> i64;
}

impl MasterRecord for Company {
    const KIND: &'static str = "Company";
    const SCREEN: Screen = Screen::Companies;
    const COLLECTION: Collection = Collection::Companies;

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn label(&self) -> &str {
        &self.name
    }
    fn records(state: &AppState) -> &[Self] {
        &state.companies
    }
    fn records_mut(state: &mut AppState) -> &mut Vec<Self> {
        &mut state.companies
    }
    fn fresh_id(state: &AppState) -> i64 {
        state.snapshot().next_company_id()
    }
}

impl MasterRecord for Supplier {
    const KIND: &'static str = "Supplier";
    const SCREEN: Screen = Screen::Suppliers;
    const COLLECTION: Collection = Collection::Suppliers;

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn label(&self) -> &str {
        &self.name
    }
    fn records(state: &AppState) -> &[Self] {
        &state.suppliers
    }
    fn records_mut(state: &mut AppState) -> &mut Vec<Self> {
        &mut state.suppliers
    }
    fn fresh_id(state: &AppState) -> i64 {
        state.snapshot().next_supplier_id()
    }
}

impl MasterRecord for ExpenseCategory {
    const KIND: &'static str = "Category";
    const SCREEN: Screen = Screen::Categories;
    const COLLECTION: Collection = Collection::Categories;

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn label(&self) -> &str {
        &self.name
    }
    fn records(state: &AppState) -> &[Self] {
        &state.categories
    }
    fn records_mut(state: &mut AppState) -> &mut Vec<Self> {
        &mut state.categories
    }
    fn fresh_id(state: &AppState) -> i64 {
        state.snapshot().next_category_id()
    }
}

pub fn list<T: MasterRecord>(state: &AppState) -> CommandResult<&[T]> {
    require_screen(state, T::SCREEN)?;
    Ok(T::records(state))
}

/// Replaces the record with the same id, or appends it. An id of `0` asks
/// for a fresh one.
pub fn save<T: MasterRecord>(state: &mut AppState, mut record: T) -> CommandResult<T> {
    require_screen(state, T::SCREEN)?;
    require_action(state, Action::ManageMasters)?;
    if record.label().trim().is_empty() {
        return Err(CommandError::Invalid(format!("{} name is required", T::KIND)));
    }

    if record.id() == 0 {
        record.set_id(T::fresh_id(state));
    }
    let records = T::records_mut(state);
    match records.iter().position(|r| r.id() == record.id()) {
        Some(index) => records[index] = record.clone(),
        None => records.push(record.clone()),
    }

    state.mark_dirty(T::COLLECTION);
    state.record(AuditEvent::new(
        AuditAction::SaveMaster,
        format!("{} {} saved", T::KIND, record.label()),
    ));
    Ok(record)
}

pub fn delete<T: MasterRecord>(state: &mut AppState, id: i64) -> CommandResult<T> {
    require_screen(state, T::SCREEN)?;
    require_action(state, Action::ManageMasters)?;
    let records = T::records_mut(state);
    let index = records
        .iter()
        .position(|r| r.id() == id)
        .ok_or_else(|| CommandError::NotFound(format!("{} {}", T::KIND, id)))?;
    let removed = records.remove(index);

    state.mark_dirty(T::COLLECTION);
    state.record(AuditEvent::new(
        AuditAction::DeleteMaster,
        format!("{} {} deleted", T::KIND, removed.label()),
    ));
    Ok(removed)
}
