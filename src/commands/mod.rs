pub mod dashboard;
pub mod invoices;
pub mod masters;
pub mod review;
pub mod roles;
pub mod settings;

use thiserror::Error;

use crate::models::Screen;
use crate::services::permissions::Action;
use crate::services::review::ReviewError;
use crate::services::state::AppState;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

pub fn require_screen(state: &AppState, screen: Screen) -> CommandResult<()> {
    let role = state.current_user.role;
    if state.permissions.can_view(role, screen) {
        Ok(())
    } else {
        tracing::warn!(user = %state.current_user.id, %role, screen = screen.as_str(), "Screen denied");
        Err(CommandError::Forbidden(format!(
            "{} cannot open {}",
            role,
            screen.as_str()
        )))
    }
}

pub fn require_action(state: &AppState, action: Action) -> CommandResult<()> {
    let role = state.current_user.role;
    if state.permissions.allows(role, action) {
        Ok(())
    } else {
        tracing::warn!(user = %state.current_user.id, %role, ?action, "Action denied");
        Err(CommandError::Forbidden(format!("{} cannot {}", role, action.describe())))
    }
}
