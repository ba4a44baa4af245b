use std::str::FromStr;

use crate::commands::{require_action, require_screen, CommandError, CommandResult};
use crate::models::{Company, Invoice, Screen};
use crate::services::permissions::Action;
use crate::services::review::{register_detected_company, QueueItem, QueueState, ReviewError, SideEffect};
use crate::services::state::AppState;
use crate::services::validation::{
    derive_totals, normalize, refresh_flags, DerivedTotals, DraftDefaults, DraftField, DraftFlags,
    Snapshot,
};

/// Builds the draft for whatever document the queue is on, or clears it.
fn open_draft(state: &mut AppState) {
    let draft = state.queue.current().map(|item| {
        let snapshot = state.snapshot();
        let mut draft = normalize(
            &item.extraction,
            &state.companies,
            &state.categories,
            &state.defaults(),
        );
        refresh_flags(&mut draft, &item.extraction, &snapshot);
        draft
    });
    state.draft = draft;
}

pub fn start_review(state: &mut AppState, items: Vec<QueueItem>) -> CommandResult<QueueState> {
    require_screen(state, Screen::Upload)?;
    let count = items.len();
    let queue_state = state.queue.load(items);
    open_draft(state);
    tracing::info!(documents = count, "Review started");
    Ok(queue_state)
}

/// Re-opens a committed invoice as a one-document review.
pub fn edit_invoice(state: &mut AppState, invoice_id: &str) -> CommandResult<QueueState> {
    require_action(state, Action::EditInvoices)?;
    let invoice = state
        .invoices
        .iter()
        .find(|inv| inv.id == invoice_id)
        .cloned()
        .ok_or_else(|| CommandError::NotFound(format!("invoice {}", invoice_id)))?;
    let queue_state = state.queue.load(vec![QueueItem::for_edit(invoice)]);
    open_draft(state);
    Ok(queue_state)
}

pub fn set_field(state: &mut AppState, field: DraftField, value: &str) -> CommandResult<DraftFlags> {
    let item = state.queue.current().ok_or(ReviewError::NothingToReview)?;
    let draft = state.draft.as_mut().ok_or(ReviewError::NothingToReview)?;
    draft.set(field, value);
    if field.affects_flags() {
        let snapshot = Snapshot {
            companies: &state.companies,
            suppliers: &state.suppliers,
            categories: &state.categories,
            invoices: &state.invoices,
        };
        refresh_flags(draft, &item.extraction, &snapshot);
    }
    Ok(draft.flags)
}

pub fn set_field_by_name(state: &mut AppState, name: &str, value: &str) -> CommandResult<DraftFlags> {
    let field = DraftField::from_str(name).map_err(CommandError::Invalid)?;
    set_field(state, field, value)
}

pub fn current_totals(state: &AppState) -> Option<DerivedTotals> {
    state
        .draft
        .as_ref()
        .map(|draft| derive_totals(draft, &state.settings.local_currency))
}

/// Registers the receiving company the document names and points the draft at it.
pub fn register_company(state: &mut AppState) -> CommandResult<Company> {
    let item = state.queue.current().ok_or(ReviewError::NothingToReview)?;
    let draft = state.draft.as_mut().ok_or(ReviewError::NothingToReview)?;
    let snapshot = Snapshot {
        companies: &state.companies,
        suppliers: &state.suppliers,
        categories: &state.categories,
        invoices: &state.invoices,
    };
    let defaults = DraftDefaults::from_settings(&state.settings);
    let effects = register_detected_company(item, draft, &snapshot, &defaults)
        .ok_or_else(|| CommandError::Invalid("no unknown company on this document".to_string()))?;

    let company = effects
        .iter()
        .find_map(|effect| match effect {
            SideEffect::NewCompany(company) => Some(company.clone()),
            _ => None,
        })
        .ok_or_else(|| CommandError::Invalid("no company was registered".to_string()))?;
    state.apply_effects(effects);
    Ok(company)
}

/// Settling a document needs the same rights that opened it: the upload
/// screen for a fresh batch, invoice editing for a re-opened invoice.
fn require_reviewer(state: &AppState) -> CommandResult<()> {
    match state.queue.current() {
        Some(item) if item.extraction.existing_id().is_some() => {
            require_action(state, Action::EditInvoices)
        }
        _ => require_screen(state, Screen::Upload),
    }
}

/// Commits the current draft and opens the next document, if any.
/// On a rejected approval both the queue and the draft stay as they were.
pub fn approve(state: &mut AppState) -> CommandResult<Invoice> {
    require_reviewer(state)?;
    let draft = state.draft.clone().ok_or(ReviewError::NothingToReview)?;
    let prompt_id = state.active_prompt_id();
    let local_currency = state.settings.local_currency.clone();
    let snapshot = Snapshot {
        companies: &state.companies,
        suppliers: &state.suppliers,
        categories: &state.categories,
        invoices: &state.invoices,
    };
    let approval = state
        .queue
        .approve(&draft, &snapshot, prompt_id, &local_currency)?;

    let invoice = approval.invoice.clone();
    state.commit(approval);
    open_draft(state);
    Ok(invoice)
}

pub fn skip(state: &mut AppState) -> CommandResult<QueueState> {
    require_reviewer(state)?;
    let next = state.queue.skip();
    open_draft(state);
    Ok(next)
}
