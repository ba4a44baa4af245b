use serde::{Deserialize, Serialize};

use crate::models::{AuditAction, AuditLogEntry, User};
use crate::utils::now_rfc3339;

/// A state change as the engine sees it; the recorder adds who and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub details: String,
}

impl AuditEvent {
    pub fn new(action: AuditAction, details: impl Into<String>) -> Self {
        AuditEvent {
            action,
            details: details.into(),
        }
    }
}

/// Append-only log, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditLogEntry>,
}

impl AuditLog {
    pub fn from_entries(entries: Vec<AuditLogEntry>) -> Self {
        AuditLog { entries }
    }

    pub fn record(&mut self, actor: &User, event: AuditEvent) -> &AuditLogEntry {
        let entry = AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            action: event.action,
            details: event.details,
            timestamp: now_rfc3339(),
        };
        tracing::info!(
            actor = %entry.actor_id,
            role = %entry.actor_role,
            action = entry.action.code(),
            "{}",
            entry.details
        );
        self.entries.insert(0, entry);
        &self.entries[0]
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn actor() -> User {
        User {
            id: "u2".into(),
            name: "Editor".into(),
            email: "editor@example.com".into(),
            role: Role::Editor,
        }
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut log = AuditLog::default();
        log.record(&actor(), AuditEvent::new(AuditAction::CreateInvoice, "first"));
        log.record(&actor(), AuditEvent::new(AuditAction::EditInvoice, "second"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].details, "second");
        assert_eq!(log.entries()[1].action, AuditAction::CreateInvoice);
        assert_eq!(log.entries()[0].actor_role, Role::Editor);
        assert_ne!(log.entries()[0].id, log.entries()[1].id);
    }

    #[test]
    fn recording_does_not_touch_earlier_entries() {
        let mut log = AuditLog::default();
        let first = log
            .record(&actor(), AuditEvent::new(AuditAction::DeleteInvoice, "gone"))
            .clone();
        log.record(&actor(), AuditEvent::new(AuditAction::SaveMaster, "saved"));
        assert_eq!(log.entries()[1], first);
    }

    #[test]
    fn action_codes_serialize_as_wire_vocabulary() {
        let json = serde_json::to_string(&AuditAction::ModifyPermissions).unwrap();
        assert_eq!(json, "\"MODIFY_PERMISSIONS\"");
        assert_eq!(AuditAction::RegisterSupplier.code(), "REGISTER_SUPPLIER");
    }
}
