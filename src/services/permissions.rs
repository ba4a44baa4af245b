use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::models::{AuditAction, Role, RolePermissionTable, RolePermissions, Screen};
use crate::services::audit::AuditEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EditInvoices,
    DeleteInvoices,
    ManageMasters,
    ManageSystem,
}

impl Action {
    pub fn describe(&self) -> &'static str {
        match self {
            Action::EditInvoices => "edit invoices",
            Action::DeleteInvoices => "delete invoices",
            Action::ManageMasters => "manage master data",
            Action::ManageSystem => "manage the system",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edit-invoices" | "canEditInvoices" => Ok(Action::EditInvoices),
            "delete-invoices" | "canDeleteInvoices" => Ok(Action::DeleteInvoices),
            "manage-masters" | "canManageMasters" => Ok(Action::ManageMasters),
            "manage-system" | "canManageSystem" => Ok(Action::ManageSystem),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

impl RolePermissions {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::EditInvoices => self.can_edit_invoices,
            Action::DeleteInvoices => self.can_delete_invoices,
            Action::ManageMasters => self.can_manage_masters,
            Action::ManageSystem => self.can_manage_system,
        }
    }

    fn flag_mut(&mut self, action: Action) -> &mut bool {
        match action {
            Action::EditInvoices => &mut self.can_edit_invoices,
            Action::DeleteInvoices => &mut self.can_delete_invoices,
            Action::ManageMasters => &mut self.can_manage_masters,
            Action::ManageSystem => &mut self.can_manage_system,
        }
    }
}

fn screens(list: &[Screen]) -> BTreeSet<Screen> {
    list.iter().copied().collect()
}

/// Role → permissions. Advisory only: the host checks it before acting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMatrix {
    table: RolePermissionTable,
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        let mut table = RolePermissionTable::new();
        table.insert(
            Role::Admin,
            RolePermissions {
                allowed_screens: screens(&[
                    Screen::Dashboard,
                    Screen::Upload,
                    Screen::Invoices,
                    Screen::Companies,
                    Screen::Suppliers,
                    Screen::Categories,
                    Screen::Prompts,
                    Screen::Users,
                    Screen::Roles,
                    Screen::Audit,
                ]),
                can_edit_invoices: true,
                can_delete_invoices: true,
                can_manage_masters: true,
                can_manage_system: true,
            },
        );
        table.insert(
            Role::Editor,
            RolePermissions {
                allowed_screens: screens(&[
                    Screen::Dashboard,
                    Screen::Upload,
                    Screen::Invoices,
                    Screen::Companies,
                    Screen::Suppliers,
                    Screen::Categories,
                ]),
                can_edit_invoices: true,
                can_delete_invoices: false,
                can_manage_masters: true,
                can_manage_system: false,
            },
        );
        table.insert(
            Role::Loader,
            RolePermissions {
                allowed_screens: screens(&[Screen::Dashboard, Screen::Upload, Screen::Invoices]),
                can_edit_invoices: false,
                can_delete_invoices: false,
                can_manage_masters: false,
                can_manage_system: false,
            },
        );
        PermissionMatrix { table }
    }
}

impl PermissionMatrix {
    /// Roles missing from a stored table fall back to the seeded defaults.
    pub fn from_table(mut table: RolePermissionTable) -> Self {
        let seeded = PermissionMatrix::default();
        for (role, perms) in seeded.table {
            table.entry(role).or_insert(perms);
        }
        PermissionMatrix { table }
    }

    pub fn permissions_for(&self, role: Role) -> RolePermissions {
        self.table.get(&role).cloned().unwrap_or_else(|| RolePermissions {
            allowed_screens: screens(&[Screen::Dashboard]),
            can_edit_invoices: false,
            can_delete_invoices: false,
            can_manage_masters: false,
            can_manage_system: false,
        })
    }

    pub fn can_view(&self, role: Role, screen: Screen) -> bool {
        self.table
            .get(&role)
            .map(|p| p.allowed_screens.contains(&screen))
            .unwrap_or(false)
    }

    /// A screen the role may not see resolves to the dashboard.
    pub fn resolve_screen(&self, role: Role, requested: Screen) -> Screen {
        if self.can_view(role, requested) {
            requested
        } else {
            Screen::Dashboard
        }
    }

    pub fn allows(&self, role: Role, action: Action) -> bool {
        self.table
            .get(&role)
            .map(|p| p.allows(action))
            .unwrap_or(false)
    }

    pub fn toggle_screen(&self, role: Role, screen: Screen) -> RolePermissions {
        let mut perms = self.permissions_for(role);
        if !perms.allowed_screens.remove(&screen) {
            perms.allowed_screens.insert(screen);
        }
        perms
    }

    pub fn toggle_action(&self, role: Role, action: Action) -> RolePermissions {
        let mut perms = self.permissions_for(role);
        let flag = perms.flag_mut(action);
        *flag = !*flag;
        perms
    }

    pub fn update(&mut self, role: Role, perms: RolePermissions) -> AuditEvent {
        self.table.insert(role, perms);
        AuditEvent::new(
            AuditAction::ModifyPermissions,
            format!("Permissions of role {} updated", role),
        )
    }

    pub fn table(&self) -> &RolePermissionTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_matrix_matches_roles() {
        let matrix = PermissionMatrix::default();
        assert!(matrix.allows(Role::Admin, Action::DeleteInvoices));
        assert!(matrix.allows(Role::Editor, Action::EditInvoices));
        assert!(!matrix.allows(Role::Editor, Action::DeleteInvoices));
        assert!(!matrix.allows(Role::Loader, Action::EditInvoices));
        assert!(matrix.can_view(Role::Loader, Screen::Upload));
        assert!(!matrix.can_view(Role::Loader, Screen::Companies));
        assert!(!matrix.can_view(Role::Editor, Screen::Audit));
    }

    #[test]
    fn hidden_screen_falls_back_to_dashboard() {
        let matrix = PermissionMatrix::default();
        assert_eq!(matrix.resolve_screen(Role::Loader, Screen::Roles), Screen::Dashboard);
        assert_eq!(matrix.resolve_screen(Role::Admin, Screen::Roles), Screen::Roles);
    }

    #[test]
    fn toggles_produce_new_permissions_without_mutating() {
        let mut matrix = PermissionMatrix::default();
        let toggled = matrix.toggle_screen(Role::Loader, Screen::Companies);
        assert!(toggled.allowed_screens.contains(&Screen::Companies));
        assert!(!matrix.can_view(Role::Loader, Screen::Companies));

        let event = matrix.update(Role::Loader, toggled);
        assert_eq!(event.action, AuditAction::ModifyPermissions);
        assert!(matrix.can_view(Role::Loader, Screen::Companies));

        let revoked = matrix.toggle_action(Role::Admin, Action::ManageSystem);
        assert!(!revoked.can_manage_system);
        assert!(matrix.allows(Role::Admin, Action::ManageSystem));
    }

    #[test]
    fn stored_table_round_trips_and_fills_gaps() {
        let matrix = PermissionMatrix::default();
        let json = serde_json::to_string(&matrix).unwrap();
        let mut table: RolePermissionTable = serde_json::from_str(&json).unwrap();
        table.remove(&Role::Loader);

        let restored = PermissionMatrix::from_table(table);
        assert_eq!(restored, matrix);
    }
}
