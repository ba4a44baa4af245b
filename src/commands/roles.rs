use crate::commands::{require_action, require_screen, CommandResult};
use crate::db::Collection;
use crate::models::{AuditLogEntry, Role, RolePermissionTable, RolePermissions, Screen};
use crate::services::permissions::Action;
use crate::services::state::AppState;

pub fn get_role_permissions(state: &AppState) -> CommandResult<&RolePermissionTable> {
    require_screen(state, Screen::Roles)?;
    Ok(state.permissions.table())
}

fn apply(state: &mut AppState, role: Role, perms: RolePermissions) -> RolePermissions {
    let event = state.permissions.update(role, perms.clone());
    state.mark_dirty(Collection::RolePermissions);
    state.record(event);
    perms
}

pub fn toggle_screen(state: &mut AppState, role: Role, screen: Screen) -> CommandResult<RolePermissions> {
    require_screen(state, Screen::Roles)?;
    require_action(state, Action::ManageSystem)?;
    let perms = state.permissions.toggle_screen(role, screen);
    Ok(apply(state, role, perms))
}

pub fn toggle_action(state: &mut AppState, role: Role, action: Action) -> CommandResult<RolePermissions> {
    require_screen(state, Screen::Roles)?;
    require_action(state, Action::ManageSystem)?;
    let perms = state.permissions.toggle_action(role, action);
    Ok(apply(state, role, perms))
}

pub fn list_audit(state: &AppState, limit: Option<usize>) -> CommandResult<&[AuditLogEntry]> {
    require_screen(state, Screen::Audit)?;
    let entries = state.audit.entries();
    Ok(&entries[..limit.unwrap_or(entries.len()).min(entries.len())])
}
